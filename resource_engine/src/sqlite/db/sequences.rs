use sqlx::SqliteConnection;

pub const RESOURCE_ID_SEQ: &str = "resource_id";
pub const COMPONENT_INQUIRY_ID_SEQ: &str = "component_inquiry_id";

/// Claims the next value from a named sequence. The increment and the read happen in one
/// statement, so concurrent callers never see the same value.
pub async fn next_val(name: &str, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let id = sqlx::query_scalar(
        "UPDATE sequence_state SET next_val = next_val + 1 WHERE name = $1 RETURNING next_val - 1",
    )
    .bind(name)
    .fetch_one(conn)
    .await?;
    Ok(id)
}
