use log::debug;
use lrp_common::Amount;
use sqlx::SqliteConnection;

use crate::db_types::{PaymentType, ReviewerPayment, UserId};

/// Inserts a payment row with a max+1 id. Wrap in a transaction when the caller needs atomicity
/// with other writes.
pub async fn insert_resource_payment(
    resource_id: i64,
    amount: Amount,
    payment_type_id: i64,
    payment_type: PaymentType,
    operator_id: UserId,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    let next_id: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(project_payment_id), 0) + 1 FROM project_payment")
        .fetch_one(&mut *conn)
        .await?;
    sqlx::query(
        r#"
        INSERT INTO project_payment
            (project_payment_id, resource_id, amount, project_payment_type_id, manual_ind, create_user, modify_user)
        VALUES ($1, $2, $3, $4, $5, $6, $6)
        "#,
    )
    .bind(next_id)
    .bind(resource_id)
    .bind(amount)
    .bind(payment_type_id)
    .bind(payment_type.manual_ind())
    .bind(operator_id)
    .execute(conn)
    .await?;
    debug!("🗃️ Payment #{next_id} of {amount} ({payment_type}) recorded for resource {resource_id}");
    Ok(next_id)
}

pub async fn update_payment_amount(
    project_payment_id: i64,
    amount: Amount,
    operator_id: UserId,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE project_payment SET amount = $2, modify_user = $3, modify_date = CURRENT_TIMESTAMP WHERE project_payment_id = $1",
    )
    .bind(project_payment_id)
    .bind(amount)
    .bind(operator_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn remove_payment_for_resource(resource_id: i64, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM project_payment WHERE resource_id = $1").bind(resource_id).execute(conn).await?;
    Ok(result.rows_affected())
}

pub async fn fetch_payment_for_resource(
    resource_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<ReviewerPayment>, sqlx::Error> {
    let payment = sqlx::query_as(
        r#"
        SELECT project_payment_id, resource_id, amount, project_payment_type_id, manual_ind
        FROM project_payment
        WHERE resource_id = $1
        "#,
    )
    .bind(resource_id)
    .fetch_optional(conn)
    .await?;
    Ok(payment)
}
