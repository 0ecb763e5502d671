use crate::db_types::{ChallengeId, LegacyId, ResourceRoleId, UserId};

/// Emitted after a role assignment has been reconciled into the legacy store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceAssignedEvent {
    pub challenge_id: ChallengeId,
    pub legacy_id: LegacyId,
    pub role: ResourceRoleId,
    pub user_id: UserId,
}

/// Emitted after a role assignment has been removed from the legacy store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRemovedEvent {
    pub challenge_id: ChallengeId,
    pub legacy_id: LegacyId,
    pub role: ResourceRoleId,
    pub user_id: UserId,
}

/// Emitted when the unregistration workflow completes. The processor forwards this to the bus as a
/// USER_UNREGISTRATION message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserUnregisteredEvent {
    pub challenge_id: ChallengeId,
    pub user_id: UserId,
}

impl UserUnregisteredEvent {
    pub fn new(challenge_id: ChallengeId, user_id: UserId) -> Self {
        Self { challenge_id, user_id }
    }
}
