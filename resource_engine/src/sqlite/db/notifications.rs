use sqlx::SqliteConnection;

use crate::db_types::{LegacyId, UserId, TIMELINE_NOTIFICATION_TYPE_ID};

pub async fn has_timeline_notification(
    project_id: LegacyId,
    user_id: UserId,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM notification WHERE project_id = $1 AND external_ref_id = $2 AND notification_type_id = $3)",
    )
    .bind(project_id)
    .bind(user_id)
    .bind(TIMELINE_NOTIFICATION_TYPE_ID)
    .fetch_one(conn)
    .await?;
    Ok(exists)
}

/// Creates the timeline notification if absent. The primary key on the triple makes this safe to
/// call on redelivery; returns `true` only when a row was actually created.
pub async fn enable_timeline_notification(
    project_id: LegacyId,
    user_id: UserId,
    operator_id: UserId,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO notification (project_id, external_ref_id, notification_type_id, create_user, modify_user)
        VALUES ($1, $2, $3, $4, $4)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(project_id)
    .bind(user_id)
    .bind(TIMELINE_NOTIFICATION_TYPE_ID)
    .bind(operator_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn disable_timeline_notification(
    project_id: LegacyId,
    user_id: UserId,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM notification WHERE project_id = $1 AND external_ref_id = $2 AND notification_type_id = $3",
    )
    .bind(project_id)
    .bind(user_id)
    .bind(TIMELINE_NOTIFICATION_TYPE_ID)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}
