use thiserror::Error;

use crate::{
    db_types::{ChallengeId, LegacyId, ResourceRoleId, UserId},
    traits::{NotificationApiError, PaymentApiError, RegistrationApiError, ResourceApiError},
};

/// Errors surfaced by the reconciliation flows. Business-rule rejections carry the user-facing
/// message; everything else is terminal for the message being processed.
#[derive(Debug, Clone, Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Resource(#[from] ResourceApiError),
    #[error("{0}")]
    Registration(#[from] RegistrationApiError),
    #[error("{0}")]
    Notification(#[from] NotificationApiError),
    #[error("{0}")]
    Payment(#[from] PaymentApiError),
    #[error("{0}")]
    Rejected(#[from] RegistrationRejection),
    #[error("Resource role {0} does not map to a known legacy role")]
    UnknownRole(ResourceRoleId),
    #[error("User {user_id} does not hold role {legacy_role_id} on challenge {project_id}")]
    NotAssigned {
        project_id: LegacyId,
        legacy_role_id: i64,
        user_id: UserId,
    },
    #[error("Challenge {0} has no legacy id yet")]
    MissingLegacyId(ChallengeId),
}

/// A registration or unregistration pre-check failure. These messages travel back to the member,
/// so the wording is part of the contract.
#[derive(Debug, Clone, Error)]
pub enum RegistrationRejection {
    #[error("User is not activated")]
    UserNotActivated,
    #[error("The challenge does not exist")]
    ChallengeNotFound(LegacyId),
    #[error("You are not eligible to register for this challenge")]
    NotEligible,
    #[error("Registration phase of the challenge is not open")]
    RegistrationClosed,
    #[error("You are already registered for this challenge")]
    AlreadyRegistered,
    #[error("You cannot participate in this challenge due to suspension")]
    Suspended,
    #[error("You are not eligible to participate in this challenge because of your country of residence")]
    CountryBanned,
    #[error("You are not eligible to participate in this challenge. Please complete your profile country information")]
    CountryMissing,
    #[error("You cannot register for this copilot posting because you are not an active member of the copilot pool")]
    CopilotPoolOnly,
    #[error("You should agree with all terms of use")]
    TermsNotAgreed,
    #[error("You are not registered for this challenge")]
    NotRegistered,
}
