use std::{fmt::Debug, sync::Arc};

use log::*;

use crate::{
    api::{
        collaborators::ForumService,
        errors::{RegistrationRejection, WorkflowError},
    },
    db_types::{AuditAction, ChallengeId, LegacyId, UserId, SUBMITTER_LEGACY_ROLE_ID},
    events::{EventProducers, UserUnregisteredEvent},
    traits::LegacyStoreDatabase,
};

/// `UnregistrationApi` tears down a submitter registration: validation, software bookkeeping
/// removal, resource cascade delete with audit, conditional forum teardown and finally the
/// outbound unregistration event.
pub struct UnregistrationApi<B> {
    db: B,
    forum: Arc<dyn ForumService>,
    producers: EventProducers,
}

impl<B> Debug for UnregistrationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UnregistrationApi")
    }
}

impl<B> UnregistrationApi<B> {
    pub fn new(db: B, forum: Arc<dyn ForumService>, producers: EventProducers) -> Self {
        Self { db, forum, producers }
    }
}

impl<B> UnregistrationApi<B>
where B: LegacyStoreDatabase
{
    pub async fn unregister(
        &self,
        challenge_id: ChallengeId,
        legacy_id: LegacyId,
        user_id: UserId,
    ) -> Result<(), WorkflowError> {
        // Step 1: pre-checks.
        let validation = self
            .db
            .validate_unregistration(legacy_id, user_id)
            .await?
            .ok_or(RegistrationRejection::ChallengeNotFound(legacy_id))?;
        if !validation.registration_open {
            return Err(RegistrationRejection::RegistrationClosed.into());
        }
        if !validation.user_registered {
            return Err(RegistrationRejection::NotRegistered.into());
        }

        // Step 2: software bookkeeping rows.
        if !validation.studio {
            self.db.delete_registration_rows(legacy_id, user_id).await?;
        }

        // Step 3: the submitter resource must exist. Its absence here means the store diverged
        // from the validation we just ran, so fail loudly rather than converge silently.
        let resource = self
            .db
            .fetch_resource(legacy_id, SUBMITTER_LEGACY_ROLE_ID, user_id)
            .await?
            .ok_or(WorkflowError::NotAssigned {
                project_id: legacy_id,
                legacy_role_id: SUBMITTER_LEGACY_ROLE_ID,
                user_id,
            })?;

        // Step 4: cascade delete, audit trail and notification teardown.
        self.db.cascade_delete_resource(resource.resource_id).await?;
        self.db
            .audit_resource_action(legacy_id, user_id, SUBMITTER_LEGACY_ROLE_ID, AuditAction::Delete, user_id)
            .await?;
        self.db.disable_timeline_notification(legacy_id, user_id).await?;

        // Step 5: forum teardown for the software track, and only when the user holds no other
        // role on the challenge. The design track carries no forum access to revoke.
        // Non-critical: each sub-step failure is logged and swallowed.
        if !validation.studio {
            let remaining = self.db.fetch_user_resources(legacy_id, user_id).await?;
            if remaining.is_empty() {
                self.teardown_forum(legacy_id, user_id).await?;
            } else {
                trace!(
                    "🔄️🚪️ User {user_id} still holds {} role(s) on {legacy_id}; forum access retained",
                    remaining.len()
                );
            }
        }

        // Step 6: tell the rest of the platform.
        self.call_user_unregistered_hook(challenge_id, user_id).await;
        debug!("🔄️🚪️ User {user_id} unregistered from {legacy_id}");
        Ok(())
    }

    async fn teardown_forum(&self, legacy_id: LegacyId, user_id: UserId) -> Result<(), WorkflowError> {
        let category = match self.db.challenge_forum_category(legacy_id).await? {
            Some(category) => Some(category),
            None => match self.db.component_info(legacy_id).await? {
                Some(component) => self.db.active_forum_category(component.component_id).await?,
                None => None,
            },
        };
        let Some(category) = category else { return Ok(()) };
        for role in [format!("Software_Users_{category}"), format!("Software_Moderators_{category}")] {
            if let Err(e) = self.forum.revoke_user_role(category, &role, user_id).await {
                warn!("🔄️🚪️ Forum revocation of {role} for user {user_id} failed: {e}");
            }
        }
        if let Err(e) = self.forum.remove_user_permission(category, user_id).await {
            warn!("🔄️🚪️ Forum permission removal for user {user_id} on category {category} failed: {e}");
        }
        if let Err(e) = self.forum.unwatch_category(category, user_id).await {
            warn!("🔄️🚪️ Forum unwatch for user {user_id} on category {category} failed: {e}");
        }
        Ok(())
    }

    async fn call_user_unregistered_hook(&self, challenge_id: ChallengeId, user_id: UserId) {
        for emitter in &self.producers.user_unregistered_producer {
            debug!("🔄️🚪️ Notifying unregistration hook subscribers");
            emitter.publish_event(UserUnregisteredEvent::new(challenge_id, user_id)).await;
        }
    }
}
