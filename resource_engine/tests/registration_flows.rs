use std::{
    pin::Pin,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use resource_engine::{
    collaborators::{ForumError, ForumService, LogOnlyForum},
    db_types::{
        ChallengeId,
        LegacyId,
        UserId,
        DESIGN_PROJECT_CATEGORY,
        DEVELOPMENT_PROJECT_CATEGORY,
        RESOURCE_INFO_STUDIO_PLACEHOLDER,
    },
    events::{EventHandlers, EventHooks, EventProducers, UserUnregisteredEvent},
    test_utils::{prepare_test_env, random_db_path, seed},
    RegistrationApi,
    RegistrationRejection,
    SqliteDatabase,
    UnregistrationApi,
    WorkflowError,
};
use uuid::Uuid;

/// A forum service that remembers every call, so tests can assert on the teardown sequence.
#[derive(Default)]
struct RecordingForum {
    calls: Mutex<Vec<String>>,
}

impl RecordingForum {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ForumService for RecordingForum {
    async fn watch_category(&self, category_id: i64, user_id: UserId) -> Result<(), ForumError> {
        self.calls.lock().unwrap().push(format!("watch {category_id} {user_id}"));
        Ok(())
    }

    async fn unwatch_category(&self, category_id: i64, user_id: UserId) -> Result<(), ForumError> {
        self.calls.lock().unwrap().push(format!("unwatch {category_id} {user_id}"));
        Ok(())
    }

    async fn grant_user_role(&self, _category_id: i64, role: &str, user_id: UserId) -> Result<(), ForumError> {
        self.calls.lock().unwrap().push(format!("grant {role} {user_id}"));
        Ok(())
    }

    async fn revoke_user_role(&self, _category_id: i64, role: &str, user_id: UserId) -> Result<(), ForumError> {
        self.calls.lock().unwrap().push(format!("revoke {role} {user_id}"));
        Ok(())
    }

    async fn remove_user_permission(&self, category_id: i64, user_id: UserId) -> Result<(), ForumError> {
        self.calls.lock().unwrap().push(format!("remove-permission {category_id} {user_id}"));
        Ok(())
    }
}

async fn new_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating test database")
}

fn registration(db: &SqliteDatabase) -> RegistrationApi<SqliteDatabase> {
    let forum: Arc<dyn ForumService> = Arc::new(LogOnlyForum);
    RegistrationApi::new(db.clone(), forum)
}

async fn count(db: &SqliteDatabase, sql: &str) -> i64 {
    sqlx::query_scalar(sql).fetch_one(db.pool()).await.expect("Error counting rows")
}

#[tokio::test]
async fn software_registration_writes_exactly_one_of_everything() {
    let db = new_db().await;
    let project = LegacyId(5001);
    let user = UserId(900);
    seed::seed_project(&db, project, DEVELOPMENT_PROJECT_CATEGORY, false).await;
    seed::open_registration_phase(&db, project).await;
    seed::seed_user(&db, user, "builder", Some("Brazil")).await;
    // Development category 2 pairs with rating phase 113.
    seed::seed_component(&db, project, 600, 6000, 113, 1).await;
    seed::seed_rating(&db, user, 113, 1550).await;
    seed::seed_reliability(&db, user, 113, 0.87).await;

    let api = registration(&db);
    api.register(project, user, false).await.expect("Registration failed");

    assert_eq!(count(&db, "SELECT COUNT(*) FROM resource").await, 1);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM notification").await, 1);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM project_user_audit WHERE audit_action_type_id = 1").await, 1);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM component_inquiry").await, 1);
    let recorded: Option<i64> = sqlx::query_scalar("SELECT old_rating FROM project_result WHERE user_id = 900")
        .fetch_one(db.pool())
        .await
        .expect("Error fetching challenge result");
    assert_eq!(recorded, Some(1550));
}

#[tokio::test]
async fn unsuitable_rating_phase_records_a_null_rating() {
    let db = new_db().await;
    let project = LegacyId(5002);
    let user = UserId(901);
    seed::seed_project(&db, project, DEVELOPMENT_PROJECT_CATEGORY, false).await;
    seed::open_registration_phase(&db, project).await;
    seed::seed_user(&db, user, "designer", Some("Poland")).await;
    // A design-phase component (112) on a development-category challenge. The user's rating is
    // looked up at the category phase (113), but the component's phase does not pair with the
    // category, so the challenge result must null it.
    seed::seed_component(&db, project, 601, 6001, 112, 1).await;
    seed::seed_rating(&db, user, 113, 2000).await;

    let api = registration(&db);
    api.register(project, user, false).await.expect("Registration failed");

    let inquiry_rating: Option<i64> = sqlx::query_scalar("SELECT rating FROM component_inquiry WHERE user_id = 901")
        .fetch_one(db.pool())
        .await
        .expect("Error fetching component inquiry");
    assert_eq!(inquiry_rating, Some(2000), "The component inquiry keeps the category-phase rating");
    let recorded: Option<i64> = sqlx::query_scalar("SELECT old_rating FROM project_result WHERE user_id = 901")
        .fetch_one(db.pool())
        .await
        .expect("Error fetching challenge result");
    assert_eq!(recorded, None, "A rating at an incompatible phase must be nulled in the challenge result");
    assert_eq!(count(&db, "SELECT COUNT(*) FROM resource_info WHERE resource_info_type_id = 4").await, 0);
}

#[tokio::test]
async fn studio_registration_records_a_component_inquiry() {
    let db = new_db().await;
    let project = LegacyId(5005);
    let user = UserId(906);
    seed::seed_project(&db, project, DESIGN_PROJECT_CATEGORY, true).await;
    seed::open_registration_phase(&db, project).await;
    seed::seed_user(&db, user, "stylist", Some("Sweden")).await;
    seed::seed_component(&db, project, 602, 6002, 112, 1).await;
    // Design category 1 pairs with rating phase 112.
    seed::seed_rating(&db, user, 112, 1400).await;

    let api = registration(&db);
    api.register(project, user, false).await.expect("Registration failed");

    assert_eq!(count(&db, "SELECT COUNT(*) FROM resource").await, 1);
    let inquiry_rating: Option<i64> = sqlx::query_scalar("SELECT rating FROM component_inquiry WHERE user_id = 906")
        .fetch_one(db.pool())
        .await
        .expect("Error fetching component inquiry");
    assert_eq!(inquiry_rating, Some(1400), "The design track records the component inquiry too");
    // No software bookkeeping, and the placeholder attribute marks the studio registration.
    assert_eq!(count(&db, "SELECT COUNT(*) FROM project_result").await, 0);
    let placeholder = format!(
        "SELECT COUNT(*) FROM resource_info WHERE resource_info_type_id = {RESOURCE_INFO_STUDIO_PLACEHOLDER}"
    );
    assert_eq!(count(&db, &placeholder).await, 1);
}

#[tokio::test]
async fn pre_check_failures_are_terminal_and_leave_no_rows() {
    let db = new_db().await;
    let project = LegacyId(5003);
    seed::seed_project(&db, project, DEVELOPMENT_PROJECT_CATEGORY, false).await;
    let api = registration(&db);

    // Unknown user.
    let err = api.register(project, UserId(999_999), false).await.expect_err("Should reject unknown user");
    assert!(matches!(err, WorkflowError::Rejected(RegistrationRejection::UserNotActivated)));

    // Registration phase closed.
    let closed = UserId(902);
    seed::seed_user(&db, closed, "late", Some("Spain")).await;
    let err = api.register(project, closed, false).await.expect_err("Should reject closed registration");
    assert!(matches!(err, WorkflowError::Rejected(RegistrationRejection::RegistrationClosed)));

    // Banned country.
    seed::open_registration_phase(&db, project).await;
    let banned = UserId(903);
    seed::seed_user(&db, banned, "blocked", Some("Iran")).await;
    let err = api.register(project, banned, false).await.expect_err("Should reject banned country");
    assert!(matches!(err, WorkflowError::Rejected(RegistrationRejection::CountryBanned)));

    // Suspended account.
    let suspended = UserId(904);
    seed::seed_user(&db, suspended, "benched", Some("Italy")).await;
    seed::suspend_user(&db, suspended).await;
    let err = api.register(project, suspended, false).await.expect_err("Should reject suspended user");
    assert!(matches!(err, WorkflowError::Rejected(RegistrationRejection::Suspended)));

    assert_eq!(count(&db, "SELECT COUNT(*) FROM resource").await, 0);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM notification").await, 0);
}

#[tokio::test]
async fn unregistration_tears_down_rows_and_emits_one_event() {
    let db = new_db().await;
    let project = LegacyId(5004);
    let user = UserId(905);
    let challenge_id = ChallengeId(Uuid::new_v4());
    seed::seed_project(&db, project, DEVELOPMENT_PROJECT_CATEGORY, false).await;
    seed::open_registration_phase(&db, project).await;
    seed::seed_user(&db, user, "leaver", Some("Kenya")).await;

    registration(&db).register(project, user, false).await.expect("Registration failed");

    let seen: Arc<Mutex<Vec<UserUnregisteredEvent>>> = Arc::new(Mutex::new(vec![]));
    let sink = seen.clone();
    let mut hooks = EventHooks::default();
    hooks.on_user_unregistered(move |ev| {
        let sink = sink.clone();
        Box::pin(async move {
            sink.lock().unwrap().push(ev);
        }) as Pin<Box<dyn std::future::Future<Output = ()> + Send>>
    });
    let handlers = EventHandlers::new(10, hooks);
    let producers: EventProducers = handlers.producers();
    handlers.start_handlers().await;

    let forum: Arc<dyn ForumService> = Arc::new(LogOnlyForum);
    let api = UnregistrationApi::new(db.clone(), forum, producers);
    api.unregister(challenge_id, project, user).await.expect("Unregistration failed");

    assert_eq!(count(&db, "SELECT COUNT(*) FROM resource").await, 0);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM notification").await, 0);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM project_result").await, 0);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM project_user_audit WHERE audit_action_type_id = 2").await, 1);

    // The hook runs on its own task.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let events = seen.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0], UserUnregisteredEvent::new(challenge_id, user));

    // A second unregistration must be loud: the registration is gone.
    drop(events);
    let err = api.unregister(challenge_id, project, user).await.expect_err("Repeat unregistration should fail");
    assert!(matches!(err, WorkflowError::Rejected(RegistrationRejection::NotRegistered)));
}

#[tokio::test]
async fn software_unregistration_revokes_forum_roles_permission_and_watch() {
    let db = new_db().await;
    let project = LegacyId(5006);
    let user = UserId(907);
    let challenge_id = ChallengeId(Uuid::new_v4());
    seed::seed_project(&db, project, DEVELOPMENT_PROJECT_CATEGORY, false).await;
    seed::open_registration_phase(&db, project).await;
    seed::seed_user(&db, user, "watcher", Some("Ireland")).await;
    seed::seed_forum_category(&db, project, 777).await;

    let forum = Arc::new(RecordingForum::default());
    let forum_port: Arc<dyn ForumService> = forum.clone();
    RegistrationApi::new(db.clone(), forum_port.clone()).register(project, user, false).await.expect("Registration failed");
    let api = UnregistrationApi::new(db.clone(), forum_port, EventProducers::default());
    api.unregister(challenge_id, project, user).await.expect("Unregistration failed");

    let calls = forum.calls();
    for expected in [
        "revoke Software_Users_777 907",
        "revoke Software_Moderators_777 907",
        "remove-permission 777 907",
        "unwatch 777 907",
    ] {
        assert!(calls.iter().any(|c| c == expected), "Missing forum call {expected:?} in {calls:?}");
    }
}

#[tokio::test]
async fn studio_unregistration_leaves_the_forum_alone() {
    let db = new_db().await;
    let project = LegacyId(5007);
    let user = UserId(908);
    let challenge_id = ChallengeId(Uuid::new_v4());
    seed::seed_project(&db, project, DESIGN_PROJECT_CATEGORY, true).await;
    seed::open_registration_phase(&db, project).await;
    seed::seed_user(&db, user, "sketcher", Some("Greece")).await;
    // Even with a forum category configured, the design track holds no forum access.
    seed::seed_forum_category(&db, project, 778).await;

    let forum = Arc::new(RecordingForum::default());
    let forum_port: Arc<dyn ForumService> = forum.clone();
    RegistrationApi::new(db.clone(), forum_port.clone()).register(project, user, false).await.expect("Registration failed");
    let api = UnregistrationApi::new(db.clone(), forum_port, EventProducers::default());
    api.unregister(challenge_id, project, user).await.expect("Unregistration failed");

    assert!(forum.calls().is_empty(), "No forum traffic expected for a studio challenge: {:?}", forum.calls());
}
