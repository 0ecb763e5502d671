use thiserror::Error;

use crate::{
    db_types::{ComponentInfo, LegacyId, RegistrationValidation, UnregistrationValidation, UserId},
    traits::NewComponentInquiry,
};

/// Queries and writes that back the registration and unregistration workflows.
#[allow(async_fn_in_trait)]
pub trait RegistrationManagement: Clone {
    /// True when the user exists and the account status is active ('A').
    async fn check_user_activated(&self, user_id: UserId) -> Result<bool, RegistrationApiError>;

    /// Returns the user's handle, or `None` when the user is unknown.
    async fn user_handle(&self, user_id: UserId) -> Result<Option<String>, RegistrationApiError>;

    /// Returns `Some(is_studio)` when the challenge exists in the legacy store, `None` otherwise.
    async fn challenge_exists(&self, project_id: LegacyId) -> Result<Option<bool>, RegistrationApiError>;

    /// Group ids restricting eligibility for the challenge. An empty list means open to all.
    async fn challenge_group_restrictions(&self, project_id: LegacyId) -> Result<Vec<i64>, RegistrationApiError>;

    /// True when the user belongs to at least one of the given groups.
    async fn user_in_any_group(&self, user_id: UserId, groups: &[i64]) -> Result<bool, RegistrationApiError>;

    /// Assembles the combined registration pre-check answer in a single round trip.
    async fn validate_registration(
        &self,
        project_id: LegacyId,
        user_id: UserId,
    ) -> Result<RegistrationValidation, RegistrationApiError>;

    /// True when the user has agreed to every terms-of-use document required for the role on this
    /// challenge.
    async fn all_terms_agreed(
        &self,
        project_id: LegacyId,
        user_id: UserId,
        legacy_role_id: i64,
    ) -> Result<bool, RegistrationApiError>;

    /// True when the user has an active copilot profile.
    async fn is_copilot(&self, user_id: UserId) -> Result<bool, RegistrationApiError>;

    /// Component metadata for the challenge, when the challenge is backed by a component.
    async fn component_info(&self, project_id: LegacyId) -> Result<Option<ComponentInfo>, RegistrationApiError>;

    /// The user's rating at the given phase, if rated.
    async fn user_rating(&self, user_id: UserId, phase_id: i64) -> Result<Option<i64>, RegistrationApiError>;

    /// The user's reliability at the given phase, as a fraction in [0, 1].
    async fn user_reliability(&self, user_id: UserId, phase_id: i64) -> Result<Option<f64>, RegistrationApiError>;

    /// Inserts a component inquiry row with an id from the named sequence. Returns the new id.
    async fn insert_component_inquiry(&self, inquiry: NewComponentInquiry) -> Result<i64, RegistrationApiError>;

    /// Inserts the challenge result row for a software registration. `rating` is `None` when the
    /// user's rating is not suitable for the challenge's phase.
    async fn insert_challenge_result(
        &self,
        project_id: LegacyId,
        user_id: UserId,
        rating: Option<i64>,
    ) -> Result<(), RegistrationApiError>;

    /// Removes the challenge result and component inquiry rows left by a software registration.
    async fn delete_registration_rows(&self, project_id: LegacyId, user_id: UserId)
        -> Result<(), RegistrationApiError>;

    /// Assembles the unregistration pre-check answer.
    async fn validate_unregistration(
        &self,
        project_id: LegacyId,
        user_id: UserId,
    ) -> Result<Option<UnregistrationValidation>, RegistrationApiError>;

    /// The active developer forum category for a component, when one is configured.
    async fn active_forum_category(&self, component_id: i64) -> Result<Option<i64>, RegistrationApiError>;

    /// The forum category recorded against the challenge itself.
    async fn challenge_forum_category(&self, project_id: LegacyId) -> Result<Option<i64>, RegistrationApiError>;
}

#[derive(Debug, Clone, Error)]
pub enum RegistrationApiError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("User {0} does not exist")]
    UserNotFound(UserId),
}

impl From<sqlx::Error> for RegistrationApiError {
    fn from(e: sqlx::Error) -> Self {
        RegistrationApiError::DatabaseError(e.to_string())
    }
}
