use std::sync::Arc;

use lrp_common::Amount;
use resource_engine::{
    collaborators::{ForumService, LogOnlyForum, NoMembership, ProjectMembership},
    db_types::{Challenge, ChallengeId, LegacyId, PaymentContext, PaymentType, ResourceRole, ResourceRoleId, UserId},
    events::EventProducers,
    policy::RolePolicy,
    test_utils::{prepare_test_env, random_db_path, seed},
    PaymentLedgerApi,
    RegistrationApi,
    ResourceFlowApi,
    SqliteDatabase,
    UnregistrationApi,
    WorkflowError,
};
use uuid::Uuid;

async fn new_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating test database")
}

fn flows(db: &SqliteDatabase) -> ResourceFlowApi<SqliteDatabase> {
    flows_with_producers(db, EventProducers::default())
}

fn flows_with_producers(db: &SqliteDatabase, producers: EventProducers) -> ResourceFlowApi<SqliteDatabase> {
    let policy = RolePolicy::default();
    let forum: Arc<dyn ForumService> = Arc::new(LogOnlyForum);
    let membership: Arc<dyn ProjectMembership> = Arc::new(NoMembership);
    let registration = RegistrationApi::new(db.clone(), forum.clone());
    let unregistration = UnregistrationApi::new(db.clone(), forum, producers.clone());
    ResourceFlowApi::new(db.clone(), policy, membership, registration, unregistration, producers)
}

fn reviewer_role() -> ResourceRole {
    ResourceRole { id: ResourceRoleId(Uuid::new_v4()), legacy_id: 4, name: "Reviewer".into() }
}

fn observer_role() -> ResourceRole {
    ResourceRole { id: ResourceRoleId(Uuid::new_v4()), legacy_id: 14, name: "Observer".into() }
}

fn challenge(legacy_id: i64) -> (ChallengeId, Challenge) {
    let id = ChallengeId(Uuid::new_v4());
    let challenge = Challenge { id: Some(id), legacy_id: Some(legacy_id), ..Challenge::default() };
    (id, challenge)
}

async fn count(db: &SqliteDatabase, sql: &str) -> i64 {
    sqlx::query_scalar(sql).fetch_one(db.pool()).await.expect("Error counting rows")
}

#[tokio::test]
async fn duplicate_assignment_is_absorbed() {
    let db = new_db().await;
    let project = LegacyId(3001);
    let user = UserId(777);
    seed::seed_project(&db, project, 2, false).await;
    seed::seed_user(&db, user, "tester", Some("Netherlands")).await;
    let api = flows(&db);
    let (cid, ch) = challenge(3001);
    let role = observer_role();

    api.assign(cid, &ch, &role, user, PaymentContext::default(), false).await.expect("First assign failed");
    api.assign(cid, &ch, &role, user, PaymentContext::default(), false).await.expect("Redelivery failed");

    assert_eq!(count(&db, "SELECT COUNT(*) FROM resource").await, 1);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM project_user_audit").await, 1);
}

#[tokio::test]
async fn redelivered_submitter_creation_is_absorbed() {
    let db = new_db().await;
    let project = LegacyId(3006);
    let user = UserId(782);
    seed::seed_project(&db, project, 2, false).await;
    seed::open_registration_phase(&db, project).await;
    seed::seed_user(&db, user, "persistent", Some("Mexico")).await;
    let api = flows(&db);
    let (cid, ch) = challenge(3006);
    let role = ResourceRole { id: RolePolicy::default().submitter_role_id, legacy_id: 1, name: "Submitter".into() };

    api.assign(cid, &ch, &role, user, PaymentContext::default(), false).await.expect("First assign failed");
    // The registration workflow would reject a second registration, so the orchestrator must
    // absorb the redelivery before it branches.
    api.assign(cid, &ch, &role, user, PaymentContext::default(), false)
        .await
        .expect("Redelivered submitter creation must succeed");

    assert_eq!(count(&db, "SELECT COUNT(*) FROM resource").await, 1);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM project_user_audit").await, 1);
}

#[tokio::test]
async fn removing_an_unassigned_role_is_loud_and_leaves_no_trace() {
    let db = new_db().await;
    let project = LegacyId(3002);
    let user = UserId(778);
    seed::seed_project(&db, project, 2, false).await;
    seed::seed_user(&db, user, "ghost", Some("Canada")).await;
    let api = flows(&db);
    let (cid, ch) = challenge(3002);

    let result = api.remove(cid, &ch, &observer_role(), user).await;
    assert!(matches!(result, Err(WorkflowError::NotAssigned { .. })));
    assert_eq!(count(&db, "SELECT COUNT(*) FROM project_user_audit").await, 0);
}

#[tokio::test]
async fn reviewer_payment_is_created_and_removed_with_the_resource() {
    let db = new_db().await;
    let project = LegacyId(3003);
    let user = UserId(779);
    seed::seed_project(&db, project, 2, false).await;
    seed::seed_user(&db, user, "reviewer", Some("Germany")).await;
    let api = flows(&db);
    let (cid, ch) = challenge(3003);
    let role = reviewer_role();
    let payment = PaymentContext {
        reviewer_amount: Some(Amount::from_dollars(250)),
        copilot_amount: None,
        payment_type: Some(PaymentType::Manual),
    };

    api.assign(cid, &ch, &role, user, payment, false).await.expect("Assign failed");
    assert_eq!(count(&db, "SELECT COUNT(*) FROM project_payment").await, 1);

    api.remove(cid, &ch, &role, user).await.expect("Remove failed");
    assert_eq!(count(&db, "SELECT COUNT(*) FROM project_payment").await, 0);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM resource").await, 0);
    // One create audit, one delete audit.
    assert_eq!(count(&db, "SELECT COUNT(*) FROM project_user_audit").await, 2);
}

#[tokio::test]
async fn notification_exempt_roles_are_not_notified() {
    let db = new_db().await;
    let project = LegacyId(3004);
    let user = UserId(780);
    seed::seed_project(&db, project, 2, false).await;
    seed::seed_user(&db, user, "quiet", Some("France")).await;
    let policy = RolePolicy::default();
    let exempt_role = ResourceRole {
        id: policy.notification_exempt_roles[0],
        legacy_id: 14,
        name: "Observer".into(),
    };
    let api = flows(&db);
    let (cid, ch) = challenge(3004);

    api.assign(cid, &ch, &exempt_role, user, PaymentContext::default(), false).await.expect("Assign failed");
    assert_eq!(count(&db, "SELECT COUNT(*) FROM notification").await, 0);

    let noisy = UserId(781);
    seed::seed_user(&db, noisy, "noisy", Some("France")).await;
    api.assign(cid, &ch, &observer_role(), noisy, PaymentContext::default(), false).await.expect("Assign failed");
    assert_eq!(count(&db, "SELECT COUNT(*) FROM notification").await, 1);
}

#[tokio::test]
async fn payment_reconciliation_is_idempotent() {
    let db = new_db().await;
    let project = LegacyId(3005);
    seed::seed_project(&db, project, 2, false).await;
    let api = flows(&db);
    let (cid, ch) = challenge(3005);
    let operator = UserId(1);
    for (user_id, handle) in [(801, "rev-a"), (802, "rev-b")] {
        let user = UserId(user_id);
        seed::seed_user(&db, user, handle, Some("Japan")).await;
        api.assign(cid, &ch, &reviewer_role(), user, PaymentContext::default(), false).await.expect("Assign failed");
    }
    let ledger = PaymentLedgerApi::new(db.clone(), RolePolicy::default());

    let first = ledger.reconcile(project, Amount::from_dollars(100), operator).await.expect("First pass failed");
    assert_eq!(first, 2);
    let second = ledger.reconcile(project, Amount::from_dollars(100), operator).await.expect("Second pass failed");
    assert_eq!(second, 0, "Converged ledger must not change on a repeated update");

    let third = ledger.reconcile(project, Amount::from_dollars(120), operator).await.expect("Third pass failed");
    assert_eq!(third, 2, "A new amount updates every reviewer row");
    assert_eq!(count(&db, "SELECT COUNT(*) FROM project_payment").await, 2);
}
