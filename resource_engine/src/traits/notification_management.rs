use thiserror::Error;

use crate::db_types::{LegacyId, UserId};

/// Behaviour for the timeline notification table.
///
/// Notifications are keyed on `(project_id, external_ref_id, notification_type_id)`, so enabling
/// an already-enabled notification is a no-op rather than a second row.
#[allow(async_fn_in_trait)]
pub trait NotificationManagement: Clone {
    async fn has_timeline_notification(&self, project_id: LegacyId, user_id: UserId)
        -> Result<bool, NotificationApiError>;

    /// Creates the timeline notification if it is absent. Returns `true` when a row was created.
    async fn enable_timeline_notification(
        &self,
        project_id: LegacyId,
        user_id: UserId,
        operator_id: UserId,
    ) -> Result<bool, NotificationApiError>;

    /// Removes the timeline notification. Returns the number of rows deleted.
    async fn disable_timeline_notification(
        &self,
        project_id: LegacyId,
        user_id: UserId,
    ) -> Result<u64, NotificationApiError>;
}

#[derive(Debug, Clone, Error)]
pub enum NotificationApiError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for NotificationApiError {
    fn from(e: sqlx::Error) -> Self {
        NotificationApiError::DatabaseError(e.to_string())
    }
}
