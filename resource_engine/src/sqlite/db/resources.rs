use log::debug;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{AuditAction, LegacyId, LegacyRole, Resource, ResourcePaymentRow, UserId},
    traits::{NewResource, ResourceApiError},
};

/// Returns the resource for the `(project, role, user)` triple, if one exists. The unique index on
/// the triple guarantees at most one row.
pub async fn fetch_resource(
    project_id: LegacyId,
    legacy_role_id: i64,
    user_id: UserId,
    conn: &mut SqliteConnection,
) -> Result<Option<Resource>, sqlx::Error> {
    let resource = sqlx::query_as(
        r#"
        SELECT resource_id, resource_role_id, project_id, user_id, create_date, modify_date
        FROM resource
        WHERE project_id = $1 AND resource_role_id = $2 AND user_id = $3
        "#,
    )
    .bind(project_id)
    .bind(legacy_role_id)
    .bind(user_id)
    .fetch_optional(conn)
    .await?;
    Ok(resource)
}

pub async fn fetch_user_resources(
    project_id: LegacyId,
    user_id: UserId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Resource>, sqlx::Error> {
    let resources = sqlx::query_as(
        r#"
        SELECT resource_id, resource_role_id, project_id, user_id, create_date, modify_date
        FROM resource
        WHERE project_id = $1 AND user_id = $2
        "#,
    )
    .bind(project_id)
    .bind(user_id)
    .fetch_all(conn)
    .await?;
    Ok(resources)
}

/// Resources on the challenge with roles in `legacy_role_ids`, each joined against its payment row
/// when one exists.
pub async fn resources_with_payments_by_roles(
    project_id: LegacyId,
    legacy_role_ids: &[i64],
    conn: &mut SqliteConnection,
) -> Result<Vec<ResourcePaymentRow>, sqlx::Error> {
    if legacy_role_ids.is_empty() {
        return Ok(vec![]);
    }
    let mut builder = QueryBuilder::new(
        r#"
        SELECT r.resource_id, r.resource_role_id, p.project_payment_id, p.amount
        FROM resource r
        LEFT JOIN project_payment p ON p.resource_id = r.resource_id
        WHERE r.project_id =
        "#,
    );
    builder.push_bind(project_id);
    builder.push(" AND r.resource_role_id IN (");
    let mut role_list = builder.separated(", ");
    for role_id in legacy_role_ids {
        role_list.push_bind(*role_id);
    }
    builder.push(")");
    let rows = builder.build_query_as::<ResourcePaymentRow>().fetch_all(conn).await?;
    Ok(rows)
}

pub async fn fetch_legacy_role(
    legacy_role_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<LegacyRole>, sqlx::Error> {
    let role = sqlx::query_as("SELECT resource_role_id, name FROM resource_role_lu WHERE resource_role_id = $1")
        .bind(legacy_role_id)
        .fetch_optional(conn)
        .await?;
    Ok(role)
}

/// Inserts the resource row with a pre-allocated id. A duplicate triple is mapped to
/// [`ResourceApiError::AlreadyExists`] carrying the existing resource id.
pub async fn insert_resource(
    resource_id: i64,
    resource: &NewResource,
    conn: &mut SqliteConnection,
) -> Result<(), ResourceApiError> {
    let result = sqlx::query(
        r#"
        INSERT INTO resource (resource_id, resource_role_id, project_id, user_id, create_user, modify_user)
        VALUES ($1, $2, $3, $4, $5, $5)
        "#,
    )
    .bind(resource_id)
    .bind(resource.resource_role_id)
    .bind(resource.project_id)
    .bind(resource.user_id)
    .bind(resource.operator_id)
    .execute(&mut *conn)
    .await;
    match result {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(de)) if de.is_unique_violation() => {
            let existing =
                fetch_resource(resource.project_id, resource.resource_role_id, resource.user_id, conn).await?;
            match existing {
                Some(r) => Err(ResourceApiError::AlreadyExists(r.resource_id)),
                // The conflicting row was deleted between the insert and the lookup. Surface the
                // original constraint error; the caller will retry on redelivery.
                None => Err(ResourceApiError::DatabaseError(de.to_string())),
            }
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn insert_attribute(
    resource_id: i64,
    type_id: i64,
    value: &str,
    operator_id: UserId,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO resource_info (resource_id, resource_info_type_id, value, create_user, modify_user)
        VALUES ($1, $2, $3, $4, $4)
        "#,
    )
    .bind(resource_id)
    .bind(type_id)
    .bind(value)
    .bind(operator_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Deletes the resource and every dependent row. Submissions are reached through the upload table,
/// so they go first, then uploads, attributes, submission links and finally the resource itself.
pub async fn cascade_delete(resource_id: i64, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM submission WHERE upload_id IN (SELECT upload_id FROM upload WHERE resource_id = $1)")
        .bind(resource_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM upload WHERE resource_id = $1").bind(resource_id).execute(&mut *conn).await?;
    sqlx::query("DELETE FROM resource_info WHERE resource_id = $1").bind(resource_id).execute(&mut *conn).await?;
    sqlx::query("DELETE FROM resource_submission WHERE resource_id = $1")
        .bind(resource_id)
        .execute(&mut *conn)
        .await?;
    let deleted = sqlx::query("DELETE FROM resource WHERE resource_id = $1").bind(resource_id).execute(conn).await?;
    debug!("🗃️ Resource {resource_id} and dependents deleted ({} resource rows)", deleted.rows_affected());
    Ok(())
}

/// Appends an audit record with a max+1 id. Both statements run on the caller's connection, so
/// wrap in a transaction when atomicity with other writes matters.
pub async fn insert_audit_record(
    project_id: LegacyId,
    user_id: UserId,
    legacy_role_id: i64,
    action: AuditAction,
    operator_id: UserId,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    let next_id: i64 =
        sqlx::query_scalar("SELECT COALESCE(MAX(project_user_audit_id), 0) + 1 FROM project_user_audit")
            .fetch_one(&mut *conn)
            .await?;
    sqlx::query(
        r#"
        INSERT INTO project_user_audit
            (project_user_audit_id, project_id, resource_user_id, resource_role_id, audit_action_type_id, action_user_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(next_id)
    .bind(project_id)
    .bind(user_id)
    .bind(legacy_role_id)
    .bind(action.type_id())
    .bind(operator_id)
    .execute(conn)
    .await?;
    Ok(next_id)
}
