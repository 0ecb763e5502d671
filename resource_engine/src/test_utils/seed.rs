//! Seed rows for the legacy schema. Panics on failure, as test fixtures should.
use crate::{
    db_types::{LegacyId, UserId, PHASE_STATUS_OPEN, PROJECT_INFO_COMPONENT_ID, PROJECT_INFO_FORUM_CATEGORY,
        REGISTRATION_PHASE_TYPE_ID},
    SqliteDatabase,
};

pub async fn seed_project(db: &SqliteDatabase, legacy_id: LegacyId, category: i64, studio: bool) {
    let studio_spec: Option<i64> = studio.then_some(1);
    sqlx::query("INSERT INTO project (project_id, project_category_id, project_studio_spec_id) VALUES ($1, $2, $3)")
        .bind(legacy_id)
        .bind(category)
        .bind(studio_spec)
        .execute(db.pool())
        .await
        .expect("Error seeding project");
}

pub async fn open_registration_phase(db: &SqliteDatabase, legacy_id: LegacyId) {
    sqlx::query("INSERT INTO project_phase (project_id, phase_type_id, phase_status_id) VALUES ($1, $2, $3)")
        .bind(legacy_id)
        .bind(REGISTRATION_PHASE_TYPE_ID)
        .bind(PHASE_STATUS_OPEN)
        .execute(db.pool())
        .await
        .expect("Error opening registration phase");
}

pub async fn seed_user(db: &SqliteDatabase, user_id: UserId, handle: &str, country: Option<&str>) {
    sqlx::query("INSERT INTO user (user_id, handle, status, suspended, country_name) VALUES ($1, $2, 'A', 0, $3)")
        .bind(user_id)
        .bind(handle)
        .bind(country)
        .execute(db.pool())
        .await
        .expect("Error seeding user");
}

pub async fn suspend_user(db: &SqliteDatabase, user_id: UserId) {
    sqlx::query("UPDATE user SET suspended = 1 WHERE user_id = $1")
        .bind(user_id)
        .execute(db.pool())
        .await
        .expect("Error suspending user");
}

pub async fn seed_component(
    db: &SqliteDatabase,
    legacy_id: LegacyId,
    component_id: i64,
    comp_vers_id: i64,
    phase_id: i64,
    version: i64,
) {
    sqlx::query("INSERT INTO project_info (project_id, project_info_type_id, value) VALUES ($1, $2, $3)")
        .bind(legacy_id)
        .bind(PROJECT_INFO_COMPONENT_ID)
        .bind(component_id.to_string())
        .execute(db.pool())
        .await
        .expect("Error seeding project component info");
    sqlx::query(
        "INSERT INTO comp_versions (comp_vers_id, component_id, phase_id, version, comments) VALUES ($1, $2, $3, $4, 'seeded')",
    )
    .bind(comp_vers_id)
    .bind(component_id)
    .bind(phase_id)
    .bind(version)
    .execute(db.pool())
    .await
    .expect("Error seeding component version");
}

pub async fn seed_rating(db: &SqliteDatabase, user_id: UserId, phase_id: i64, rating: i64) {
    sqlx::query("INSERT INTO user_rating (user_id, phase_id, rating) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(phase_id)
        .bind(rating)
        .execute(db.pool())
        .await
        .expect("Error seeding rating");
}

pub async fn seed_reliability(db: &SqliteDatabase, user_id: UserId, phase_id: i64, reliability: f64) {
    sqlx::query("INSERT INTO user_reliability (user_id, phase_id, rating) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(phase_id)
        .bind(reliability)
        .execute(db.pool())
        .await
        .expect("Error seeding reliability");
}

pub async fn seed_forum_category(db: &SqliteDatabase, legacy_id: LegacyId, category_id: i64) {
    sqlx::query("INSERT INTO project_info (project_id, project_info_type_id, value) VALUES ($1, $2, $3)")
        .bind(legacy_id)
        .bind(PROJECT_INFO_FORUM_CATEGORY)
        .bind(category_id.to_string())
        .execute(db.pool())
        .await
        .expect("Error seeding forum category");
}
