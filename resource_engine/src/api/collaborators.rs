//! Ports for the external collaborators the flows talk to.
//!
//! Forum permissions live in a separate system, and project membership is owned by the upstream
//! platform. Both are object-safe so the processor can wire concrete clients at startup and tests
//! can substitute fakes.
use async_trait::async_trait;
use log::info;
use thiserror::Error;

use crate::db_types::{ChallengeId, UserId};

#[derive(Debug, Clone, Error)]
#[error("Forum operation failed: {0}")]
pub struct ForumError(pub String);

/// Developer forum side effects. All forum calls are non-critical: callers log failures and carry
/// on.
#[async_trait]
pub trait ForumService: Send + Sync {
    async fn watch_category(&self, category_id: i64, user_id: UserId) -> Result<(), ForumError>;
    async fn unwatch_category(&self, category_id: i64, user_id: UserId) -> Result<(), ForumError>;
    async fn grant_user_role(&self, category_id: i64, role: &str, user_id: UserId) -> Result<(), ForumError>;
    async fn revoke_user_role(&self, category_id: i64, role: &str, user_id: UserId) -> Result<(), ForumError>;
    async fn remove_user_permission(&self, category_id: i64, user_id: UserId) -> Result<(), ForumError>;
}

/// A forum service that records what would have happened. The legacy forum backend has no
/// reachable API from this service, so deployments run with this implementation until one exists.
#[derive(Debug, Default, Clone)]
pub struct LogOnlyForum;

#[async_trait]
impl ForumService for LogOnlyForum {
    async fn watch_category(&self, category_id: i64, user_id: UserId) -> Result<(), ForumError> {
        info!("🗣️ Forum: user {user_id} would watch category {category_id}");
        Ok(())
    }

    async fn unwatch_category(&self, category_id: i64, user_id: UserId) -> Result<(), ForumError> {
        info!("🗣️ Forum: user {user_id} would unwatch category {category_id}");
        Ok(())
    }

    async fn grant_user_role(&self, category_id: i64, role: &str, user_id: UserId) -> Result<(), ForumError> {
        info!("🗣️ Forum: user {user_id} would be granted role {role} on category {category_id}");
        Ok(())
    }

    async fn revoke_user_role(&self, category_id: i64, role: &str, user_id: UserId) -> Result<(), ForumError> {
        info!("🗣️ Forum: user {user_id} would lose role {role} on category {category_id}");
        Ok(())
    }

    async fn remove_user_permission(&self, category_id: i64, user_id: UserId) -> Result<(), ForumError> {
        info!("🗣️ Forum: user {user_id} would lose permissions on category {category_id}");
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
#[error("Membership lookup failed: {0}")]
pub struct MembershipError(pub String);

/// Upstream project membership, consulted for the manager notification carve-out.
#[async_trait]
pub trait ProjectMembership: Send + Sync {
    /// The user's membership role names on the project that owns the challenge.
    async fn member_roles(&self, user_id: UserId, challenge_id: ChallengeId) -> Result<Vec<String>, MembershipError>;
}

/// A membership port that knows nobody. Useful for tests and for deployments where the manager
/// carve-out is not needed.
#[derive(Debug, Default, Clone)]
pub struct NoMembership;

#[async_trait]
impl ProjectMembership for NoMembership {
    async fn member_roles(&self, _user_id: UserId, _challenge_id: ChallengeId) -> Result<Vec<String>, MembershipError> {
        Ok(vec![])
    }
}
