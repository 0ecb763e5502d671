//! End-to-end dispatcher tests: bus message in, legacy store rows (and outbound messages) out.
use std::{
    collections::HashMap,
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use resource_engine::{
    collaborators::{ForumService, LogOnlyForum, ProjectMembership},
    db_types::{Challenge, ChallengeId, LegacyId, ResourceRole, ResourceRoleId, UserId},
    events::{EventHandlers, EventHooks},
    policy::RolePolicy,
    test_utils::{prepare_test_env, random_db_path, seed},
    PaymentLedgerApi,
    RegistrationApi,
    ResourceFlowApi,
    SqliteDatabase,
    UnregistrationApi,
};
use resource_processor::{
    bus::{InMemoryBus, MessageBus},
    config::ProcessorConfig,
    dispatcher::Dispatcher,
    messages::{UnregisteredNotice, USER_UNREGISTRATION},
    upstream::{ChallengeApi, UpstreamError, UpstreamMembership},
};
use uuid::Uuid;

#[derive(Default)]
struct FakeChallengeApi {
    challenges: Mutex<HashMap<ChallengeId, Challenge>>,
    roles: Mutex<HashMap<ResourceRoleId, ResourceRole>>,
}

impl FakeChallengeApi {
    fn insert_challenge(&self, id: ChallengeId, challenge: Challenge) {
        self.challenges.lock().unwrap().insert(id, challenge);
    }

    fn insert_role(&self, role: ResourceRole) {
        self.roles.lock().unwrap().insert(role.id, role);
    }
}

#[async_trait]
impl ChallengeApi for FakeChallengeApi {
    async fn get_challenge(&self, id: ChallengeId) -> Result<Challenge, UpstreamError> {
        self.challenges.lock().unwrap().get(&id).cloned().ok_or_else(|| UpstreamError::NotFound(id.to_string()))
    }

    async fn get_resource_role(&self, id: ResourceRoleId) -> Result<ResourceRole, UpstreamError> {
        self.roles.lock().unwrap().get(&id).cloned().ok_or_else(|| UpstreamError::NotFound(id.to_string()))
    }

    async fn member_project_roles(
        &self,
        _user_id: UserId,
        _challenge_id: ChallengeId,
    ) -> Result<Vec<String>, UpstreamError> {
        Ok(vec![])
    }
}

struct Harness {
    db: SqliteDatabase,
    bus: Arc<InMemoryBus>,
    api: Arc<FakeChallengeApi>,
    dispatcher: Dispatcher<SqliteDatabase>,
    config: ProcessorConfig,
}

async fn harness(retry_delay: Duration) -> Harness {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating test database");
    let config = ProcessorConfig { retry_delay, ..ProcessorConfig::default() };
    let bus = Arc::new(InMemoryBus::subscribed_to(&[
        &config.topics.create,
        &config.topics.delete,
        &config.topics.payment_update,
    ]));
    let api = Arc::new(FakeChallengeApi::default());
    let forum: Arc<dyn ForumService> = Arc::new(LogOnlyForum);
    let upstream: Arc<dyn ChallengeApi> = api.clone();
    let membership: Arc<dyn ProjectMembership> = Arc::new(UpstreamMembership::new(upstream.clone()));

    let mut hooks = EventHooks::default();
    let outbound_bus = bus.clone();
    let outbound_topic = config.topics.outbound.clone();
    hooks.on_user_unregistered(move |event| {
        let bus = outbound_bus.clone();
        let topic = outbound_topic.clone();
        Box::pin(async move {
            let body = serde_json::to_string(&UnregisteredNotice::from(event)).unwrap();
            bus.publish(&topic, body).await.unwrap();
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let handlers = EventHandlers::new(10, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let registration = RegistrationApi::new(db.clone(), forum.clone());
    let unregistration = UnregistrationApi::new(db.clone(), forum, producers.clone());
    let flows =
        ResourceFlowApi::new(db.clone(), config.policy.clone(), membership, registration, unregistration, producers);
    let ledger = PaymentLedgerApi::new(db.clone(), config.policy.clone());
    let dispatcher =
        Dispatcher::new(bus.clone() as Arc<dyn MessageBus>, upstream, db.clone(), flows, ledger, &config);
    Harness { db, bus, api, dispatcher, config }
}

fn resource_event(topic: &str, challenge_id: ChallengeId, role_id: ResourceRoleId, member_id: i64) -> String {
    serde_json::json!({
        "topic": topic,
        "originator": "test.producer",
        "timestamp": "2024-05-01T00:00:00Z",
        "mimeType": "application/json",
        "payload": { "challengeId": challenge_id, "roleId": role_id, "memberId": member_id },
    })
    .to_string()
}

fn upstream_challenge(legacy_id: i64) -> Challenge {
    Challenge { legacy_id: Some(legacy_id), type_name: "Code".into(), ..Challenge::default() }
}

fn observer_role() -> ResourceRole {
    ResourceRole { id: ResourceRoleId(Uuid::new_v4()), legacy_id: 14, name: "Observer".into() }
}

fn reviewer_role() -> ResourceRole {
    ResourceRole { id: ResourceRoleId(Uuid::new_v4()), legacy_id: 4, name: "Reviewer".into() }
}

fn submitter_role(policy: &RolePolicy) -> ResourceRole {
    ResourceRole { id: policy.submitter_role_id, legacy_id: 1, name: "Submitter".into() }
}

async fn count(db: &SqliteDatabase, sql: &str) -> i64 {
    sqlx::query_scalar(sql).fetch_one(db.pool()).await.expect("Error counting rows")
}

#[tokio::test]
async fn not_ready_messages_are_requeued_until_the_challenge_materializes() {
    let h = harness(Duration::from_millis(50)).await;
    let challenge_id = ChallengeId(Uuid::new_v4());
    let role = observer_role();
    let user = UserId(600);
    h.api.insert_role(role.clone());
    seed::seed_user(&h.db, user, "early-bird", Some("Norway")).await;

    let body = resource_event(&h.config.topics.create, challenge_id, role.id, 600);
    h.bus.publish(&h.config.topics.create, body).await.unwrap();

    // The challenge is unknown upstream: the message must be requeued, not dropped or failed.
    h.dispatcher.drain().await;
    assert_eq!(count(&h.db, "SELECT COUNT(*) FROM resource").await, 0);

    // Still unknown on the second lap.
    tokio::time::sleep(Duration::from_millis(120)).await;
    h.dispatcher.drain().await;
    assert_eq!(count(&h.db, "SELECT COUNT(*) FROM resource").await, 0);

    // Once both systems know the challenge, the next requeue goes through.
    h.api.insert_challenge(challenge_id, upstream_challenge(6001));
    seed::seed_project(&h.db, LegacyId(6001), 2, false).await;
    tokio::time::sleep(Duration::from_millis(120)).await;
    h.dispatcher.drain().await;
    assert_eq!(count(&h.db, "SELECT COUNT(*) FROM resource").await, 1);
}

#[tokio::test]
async fn submitter_creation_message_writes_exactly_one_of_everything() {
    let h = harness(Duration::from_millis(50)).await;
    let challenge_id = ChallengeId(Uuid::new_v4());
    let role = submitter_role(&h.config.policy);
    let user = UserId(601);
    h.api.insert_role(role.clone());
    h.api.insert_challenge(challenge_id, upstream_challenge(6002));
    seed::seed_project(&h.db, LegacyId(6002), 2, false).await;
    seed::open_registration_phase(&h.db, LegacyId(6002)).await;
    seed::seed_user(&h.db, user, "contender", Some("Portugal")).await;

    let body = resource_event(&h.config.topics.create, challenge_id, role.id, 601);
    h.bus.publish(&h.config.topics.create, body.clone()).await.unwrap();
    h.dispatcher.drain().await;

    assert_eq!(count(&h.db, "SELECT COUNT(*) FROM resource").await, 1);
    assert_eq!(count(&h.db, "SELECT COUNT(*) FROM notification").await, 1);
    assert_eq!(count(&h.db, "SELECT COUNT(*) FROM project_user_audit WHERE audit_action_type_id = 1").await, 1);

    // A redelivered copy of the same message is absorbed as a success: no new rows, no requeue.
    h.bus.publish(&h.config.topics.create, body).await.unwrap();
    h.dispatcher.drain().await;
    assert_eq!(count(&h.db, "SELECT COUNT(*) FROM resource").await, 1);
    assert_eq!(count(&h.db, "SELECT COUNT(*) FROM project_user_audit").await, 1);
    assert_eq!(h.bus.committed(), 1, "Both offsets must be committed");
    // Past the retry window, the only messages on the create topic are the two we published.
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(h.bus.published_to(&h.config.topics.create).len(), 2, "The redelivery must not be requeued");
}

#[tokio::test]
async fn submitter_deletion_message_tears_down_and_notifies_once() {
    let h = harness(Duration::from_millis(50)).await;
    let challenge_id = ChallengeId(Uuid::new_v4());
    let role = submitter_role(&h.config.policy);
    let user = UserId(602);
    h.api.insert_role(role.clone());
    h.api.insert_challenge(challenge_id, upstream_challenge(6003));
    seed::seed_project(&h.db, LegacyId(6003), 2, false).await;
    seed::open_registration_phase(&h.db, LegacyId(6003)).await;
    seed::seed_user(&h.db, user, "quitter", Some("Chile")).await;

    let create = resource_event(&h.config.topics.create, challenge_id, role.id, 602);
    h.bus.publish(&h.config.topics.create, create).await.unwrap();
    h.dispatcher.drain().await;
    assert_eq!(count(&h.db, "SELECT COUNT(*) FROM resource").await, 1);

    let delete = resource_event(&h.config.topics.delete, challenge_id, role.id, 602);
    h.bus.publish(&h.config.topics.delete, delete).await.unwrap();
    h.dispatcher.drain().await;

    assert_eq!(count(&h.db, "SELECT COUNT(*) FROM resource").await, 0);
    assert_eq!(count(&h.db, "SELECT COUNT(*) FROM notification").await, 0);

    // The unregistration notice is published from the event hook's own task.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let outbound = h.bus.published_to(&h.config.topics.outbound);
    assert_eq!(outbound.len(), 1, "Exactly one unregistration notice must go out");
    let notice: UnregisteredNotice = serde_json::from_str(&outbound[0]).unwrap();
    assert_eq!(notice.notice_type, USER_UNREGISTRATION);
    assert_eq!(notice.detail.challenge_id, challenge_id);
    assert_eq!(notice.detail.user_id, user);
}

#[tokio::test]
async fn payment_update_message_reconciles_every_reviewer() {
    let h = harness(Duration::from_millis(50)).await;
    let challenge_id = ChallengeId(Uuid::new_v4());
    let role = reviewer_role();
    h.api.insert_role(role.clone());
    // No prize configuration on the challenge itself, so assignment creates no payment rows.
    h.api.insert_challenge(challenge_id, upstream_challenge(6004));
    seed::seed_project(&h.db, LegacyId(6004), 2, false).await;
    for (member_id, handle) in [(603, "rev-one"), (604, "rev-two")] {
        seed::seed_user(&h.db, UserId(member_id), handle, Some("India")).await;
        let body = resource_event(&h.config.topics.create, challenge_id, role.id, member_id);
        h.bus.publish(&h.config.topics.create, body).await.unwrap();
    }
    h.dispatcher.drain().await;
    assert_eq!(count(&h.db, "SELECT COUNT(*) FROM resource").await, 2);
    assert_eq!(count(&h.db, "SELECT COUNT(*) FROM project_payment").await, 0);

    let body = serde_json::json!({
        "topic": h.config.topics.payment_update,
        "originator": "test.producer",
        "timestamp": "2024-05-01T00:00:00Z",
        "mimeType": "application/json",
        "payload": {
            "legacyId": 6004,
            "updatedBy": 1,
            "metadata": [{ "name": "reviewerPayment", "value": 150 }],
        },
    })
    .to_string();
    h.bus.publish(&h.config.topics.payment_update, body).await.unwrap();
    h.dispatcher.drain().await;
    assert_eq!(count(&h.db, "SELECT COUNT(*) FROM project_payment").await, 2);
    assert_eq!(count(&h.db, "SELECT COUNT(*) FROM project_payment WHERE amount = 15000").await, 2);
}

#[tokio::test]
async fn malformed_messages_are_dropped_and_their_offsets_committed() {
    let h = harness(Duration::from_millis(50)).await;

    // Not JSON at all.
    h.bus.publish(&h.config.topics.create, "certainly { not json".into()).await.unwrap();
    // Envelope topic disagrees with the bus topic it arrived on.
    let mismatched = resource_event(
        &h.config.topics.delete,
        ChallengeId(Uuid::new_v4()),
        ResourceRoleId(Uuid::new_v4()),
        42,
    );
    h.bus.publish(&h.config.topics.create, mismatched).await.unwrap();
    // Schema-valid envelope, out-of-range member id.
    let negative = resource_event(
        &h.config.topics.create,
        ChallengeId(Uuid::new_v4()),
        ResourceRoleId(Uuid::new_v4()),
        -7,
    );
    h.bus.publish(&h.config.topics.create, negative).await.unwrap();

    h.dispatcher.drain().await;
    assert_eq!(count(&h.db, "SELECT COUNT(*) FROM resource").await, 0);
    assert_eq!(h.bus.committed(), 2, "Dropped messages must still have their offsets committed");
}
