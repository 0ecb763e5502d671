use thiserror::Error;

use crate::{
    db_types::{AuditAction, LegacyId, LegacyRole, Resource, ResourcePaymentRow, UserId},
    traits::NewResource,
};

/// Behaviour for the resource table and its dependents.
///
/// The resource table holds at most one row per `(project_id, resource_role_id, user_id)` triple,
/// enforced by a unique index. Backends map a duplicate-key insert to
/// [`ResourceApiError::AlreadyExists`] so that callers can treat redelivered creation messages as
/// idempotent successes.
#[allow(async_fn_in_trait)]
pub trait ResourceManagement: Clone {
    /// Returns the resource for the given triple, if any.
    async fn fetch_resource(
        &self,
        project_id: LegacyId,
        legacy_role_id: i64,
        user_id: UserId,
    ) -> Result<Option<Resource>, ResourceApiError>;

    /// Returns all of a user's resources on the given challenge, across roles.
    async fn fetch_user_resources(
        &self,
        project_id: LegacyId,
        user_id: UserId,
    ) -> Result<Vec<Resource>, ResourceApiError>;

    /// Returns every resource on the challenge whose role is in `legacy_role_ids`, joined against
    /// its payment row when one exists.
    async fn resources_with_payments_by_roles(
        &self,
        project_id: LegacyId,
        legacy_role_ids: &[i64],
    ) -> Result<Vec<ResourcePaymentRow>, ResourceApiError>;

    /// Looks up a legacy role definition by its numeric id.
    async fn fetch_legacy_role(&self, legacy_role_id: i64) -> Result<Option<LegacyRole>, ResourceApiError>;

    /// Allocates a resource id from the named sequence and inserts the resource row together with
    /// its attribute rows, in a single transaction.
    ///
    /// Returns the new resource id. A duplicate triple surfaces as
    /// [`ResourceApiError::AlreadyExists`] with the existing resource id.
    async fn create_resource(&self, resource: NewResource) -> Result<i64, ResourceApiError>;

    /// Deletes the resource and every dependent row (attributes, submissions via uploads, the
    /// uploads themselves) in a single transaction.
    async fn cascade_delete_resource(&self, resource_id: i64) -> Result<(), ResourceApiError>;

    /// Appends a record to the audit trail. The audit id is assigned as max+1 at insert time.
    async fn audit_resource_action(
        &self,
        project_id: LegacyId,
        user_id: UserId,
        legacy_role_id: i64,
        action: AuditAction,
        operator_id: UserId,
    ) -> Result<i64, ResourceApiError>;
}

#[derive(Debug, Clone, Error)]
pub enum ResourceApiError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("Resource already exists with id {0}")]
    AlreadyExists(i64),
    #[error("Resource {0} does not exist")]
    ResourceNotFound(i64),
}

impl From<sqlx::Error> for ResourceApiError {
    fn from(e: sqlx::Error) -> Self {
        ResourceApiError::DatabaseError(e.to_string())
    }
}
