use std::{fmt::Debug, sync::Arc};

use chrono::Utc;
use log::*;

use crate::{
    api::{
        collaborators::ProjectMembership,
        errors::WorkflowError,
        registration_api::RegistrationApi,
        unregistration_api::UnregistrationApi,
    },
    db_types::{
        AuditAction,
        Challenge,
        ChallengeId,
        LegacyId,
        PaymentContext,
        ResourceRole,
        UserId,
        APPEALS_COMPLETED_NO,
        RESOURCE_INFO_APPEALS_COMPLETED,
        RESOURCE_INFO_EXTERNAL_REF,
        RESOURCE_INFO_HANDLE,
        RESOURCE_INFO_PAYMENT,
        RESOURCE_INFO_REGISTRATION_DATE,
        SUBMITTER_LEGACY_ROLE_ID,
    },
    events::{EventProducers, ResourceAssignedEvent, ResourceRemovedEvent},
    policy::RolePolicy,
    traits::{LegacyStoreDatabase, NewResource, ResourceApiError, ResourceAttribute},
};

const ASSIGNMENT_DATE_FORMAT: &str = "%m.%d.%Y %I:%M %p";

/// `ResourceFlowApi` is the orchestrator for challenge-resource events. Submitter-role traffic is
/// delegated to the registration/unregistration workflows; every other role takes the direct
/// path: resource row + attributes, payment side effects, audit trail and notification policy.
pub struct ResourceFlowApi<B> {
    db: B,
    policy: RolePolicy,
    membership: Arc<dyn ProjectMembership>,
    registration: RegistrationApi<B>,
    unregistration: UnregistrationApi<B>,
    producers: EventProducers,
}

impl<B> Debug for ResourceFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ResourceFlowApi")
    }
}

impl<B> ResourceFlowApi<B> {
    pub fn new(
        db: B,
        policy: RolePolicy,
        membership: Arc<dyn ProjectMembership>,
        registration: RegistrationApi<B>,
        unregistration: UnregistrationApi<B>,
        producers: EventProducers,
    ) -> Self {
        Self { db, policy, membership, registration, unregistration, producers }
    }
}

impl<B> ResourceFlowApi<B>
where B: LegacyStoreDatabase
{
    /// Reconciles a creation event into the legacy store.
    ///
    /// Idempotent: a triple that already exists (whether observed up front or lost to a
    /// duplicate-key race on insert) is absorbed as success, so redelivered messages converge.
    pub async fn assign(
        &self,
        challenge_id: ChallengeId,
        challenge: &Challenge,
        role: &ResourceRole,
        user_id: UserId,
        payment: PaymentContext,
        admin_caller: bool,
    ) -> Result<(), WorkflowError> {
        let legacy_id = challenge.legacy_id.map(LegacyId).ok_or(WorkflowError::MissingLegacyId(challenge_id))?;
        // The existence check comes before any workflow branching, so a redelivered creation
        // message is a no-op success for every role, submitters included.
        if let Some(existing) = self.db.fetch_resource(legacy_id, role.legacy_id, user_id).await? {
            info!(
                "🔄️📦️ User {user_id} already holds role {} on {legacy_id} (resource {}). Absorbing redelivery.",
                role.name, existing.resource_id
            );
            return Ok(());
        }
        if self.policy.is_submitter(role.id) {
            self.registration.register(legacy_id, user_id, admin_caller).await?;
            self.call_assigned_hook(challenge_id, legacy_id, role, user_id).await;
            return Ok(());
        }
        let legacy_role = self
            .db
            .fetch_legacy_role(role.legacy_id)
            .await?
            .ok_or(WorkflowError::UnknownRole(role.id))?;

        let handle = self.db.user_handle(user_id).await?.unwrap_or_else(|| user_id.to_string());
        let mut attributes = vec![
            ResourceAttribute::new(RESOURCE_INFO_EXTERNAL_REF, user_id.to_string()),
            ResourceAttribute::new(RESOURCE_INFO_HANDLE, handle),
            ResourceAttribute::new(
                RESOURCE_INFO_REGISTRATION_DATE,
                Utc::now().format(ASSIGNMENT_DATE_FORMAT).to_string(),
            ),
            ResourceAttribute::new(RESOURCE_INFO_APPEALS_COMPLETED, APPEALS_COMPLETED_NO),
        ];
        if self.policy.is_copilot_class(role.legacy_id) {
            if let Some(copilot_amount) = payment.copilot_amount {
                attributes.push(ResourceAttribute::new(RESOURCE_INFO_PAYMENT, copilot_amount.as_dollars_f64().to_string()));
            }
        }
        let new_resource = NewResource {
            project_id: legacy_id,
            resource_role_id: legacy_role.resource_role_id,
            user_id,
            operator_id: user_id,
            attributes,
        };
        let resource_id = match self.db.create_resource(new_resource).await {
            Ok(id) => id,
            Err(ResourceApiError::AlreadyExists(id)) => {
                info!("🔄️📦️ Lost the insert race for role {} on {legacy_id}; keeping resource {id}", role.name);
                return Ok(());
            },
            Err(e) => return Err(e.into()),
        };

        if self.policy.is_reviewer_class(role.legacy_id) {
            if let Some(amount) = payment.reviewer_amount {
                self.db
                    .insert_resource_payment(
                        resource_id,
                        amount,
                        self.policy.reviewer_payment_type_id,
                        payment.payment_type(),
                        user_id,
                    )
                    .await?;
            }
        }
        self.db
            .audit_resource_action(legacy_id, user_id, legacy_role.resource_role_id, AuditAction::Create, user_id)
            .await?;
        self.apply_notification_policy(challenge_id, legacy_id, role, user_id).await?;

        self.call_assigned_hook(challenge_id, legacy_id, role, user_id).await;
        debug!("🔄️📦️ Role {} assigned to user {user_id} on {legacy_id} (resource {resource_id})", role.name);
        Ok(())
    }

    /// Reconciles a deletion event. Removal of a triple that does not exist is loud: the upstream
    /// believed the assignment existed, so silence here would hide divergence.
    pub async fn remove(
        &self,
        challenge_id: ChallengeId,
        challenge: &Challenge,
        role: &ResourceRole,
        user_id: UserId,
    ) -> Result<(), WorkflowError> {
        let legacy_id = challenge.legacy_id.map(LegacyId).ok_or(WorkflowError::MissingLegacyId(challenge_id))?;
        if self.policy.is_submitter(role.id) {
            self.unregistration.unregister(challenge_id, legacy_id, user_id).await?;
            self.call_removed_hook(challenge_id, legacy_id, role, user_id).await;
            return Ok(());
        }

        let resource = self
            .db
            .fetch_resource(legacy_id, role.legacy_id, user_id)
            .await?
            .ok_or(WorkflowError::NotAssigned {
                project_id: legacy_id,
                legacy_role_id: role.legacy_id,
                user_id,
            })?;

        // Payment rows reference the resource, so they go first.
        if self.policy.is_reviewer_class(role.legacy_id) {
            let removed = self.db.remove_payment_for_resource(resource.resource_id).await?;
            if removed > 0 {
                debug!("🔄️📦️ Removed {removed} payment row(s) for resource {}", resource.resource_id);
            }
        }
        // Submitter-class roles arriving via the direct path still leave software bookkeeping
        // behind. Best effort: log and continue.
        if role.legacy_id == SUBMITTER_LEGACY_ROLE_ID {
            if let Err(e) = self.db.delete_registration_rows(legacy_id, user_id).await {
                warn!("🔄️📦️ Could not remove registration bookkeeping for user {user_id} on {legacy_id}: {e}");
            }
        }

        self.db.cascade_delete_resource(resource.resource_id).await?;
        self.db
            .audit_resource_action(legacy_id, user_id, role.legacy_id, AuditAction::Delete, user_id)
            .await?;
        if !self.policy.is_notification_exempt(role.id) {
            self.db.disable_timeline_notification(legacy_id, user_id).await?;
        }

        self.call_removed_hook(challenge_id, legacy_id, role, user_id).await;
        debug!("🔄️📦️ Role {} removed from user {user_id} on {legacy_id}", role.name);
        Ok(())
    }

    /// Exempt roles never get notified. The manager role consults the upstream project membership:
    /// when the user's own membership role on the owning project is exempt (e.g. they *are* the
    /// manager or the customer), the notification is suppressed.
    async fn apply_notification_policy(
        &self,
        challenge_id: ChallengeId,
        legacy_id: LegacyId,
        role: &ResourceRole,
        user_id: UserId,
    ) -> Result<(), WorkflowError> {
        if self.policy.is_notification_exempt(role.id) {
            trace!("🔄️📦️ Role {} is notification-exempt; user {user_id} not notified", role.name);
            return Ok(());
        }
        if self.policy.is_manager(role.id) {
            match self.membership.member_roles(user_id, challenge_id).await {
                Ok(roles) => {
                    if roles.iter().any(|r| self.policy.is_exempt_project_role(r)) {
                        trace!(
                            "🔄️📦️ User {user_id} holds an exempt project role on {challenge_id}; notification \
                             suppressed"
                        );
                        return Ok(());
                    }
                },
                Err(e) => {
                    // Membership is advisory here. Default to notifying rather than dropping it.
                    warn!("🔄️📦️ Membership lookup for user {user_id} on {challenge_id} failed: {e}");
                },
            }
        }
        self.db.enable_timeline_notification(legacy_id, user_id, user_id).await?;
        Ok(())
    }

    async fn call_assigned_hook(&self, challenge_id: ChallengeId, legacy_id: LegacyId, role: &ResourceRole, user_id: UserId) {
        for emitter in &self.producers.resource_assigned_producer {
            let event = ResourceAssignedEvent { challenge_id, legacy_id, role: role.id, user_id };
            emitter.publish_event(event).await;
        }
    }

    async fn call_removed_hook(&self, challenge_id: ChallengeId, legacy_id: LegacyId, role: &ResourceRole, user_id: UserId) {
        for emitter in &self.producers.resource_removed_producer {
            let event = ResourceRemovedEvent { challenge_id, legacy_id, role: role.id, user_id };
            emitter.publish_event(event).await;
        }
    }
}
