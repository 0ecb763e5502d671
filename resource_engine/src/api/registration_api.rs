use std::{fmt::Debug, sync::Arc};

use chrono::Utc;
use log::*;

use crate::{
    api::{
        collaborators::ForumService,
        errors::{RegistrationRejection, WorkflowError},
    },
    db_types::{
        AuditAction,
        LegacyId,
        UserId,
        APPEALS_COMPLETED_NO,
        COMPONENT_TESTING_PROJECT_CATEGORY,
        COPILOT_POSTING_PROJECT_CATEGORY,
        DEVELOPMENT_PHASE_ID,
        RATING_PHASE_OFFSET,
        RESOURCE_INFO_APPEALS_COMPLETED,
        RESOURCE_INFO_EXTERNAL_REF,
        RESOURCE_INFO_HANDLE,
        RESOURCE_INFO_RATING,
        RESOURCE_INFO_REGISTRATION_DATE,
        RESOURCE_INFO_RELIABILITY,
        RESOURCE_INFO_STUDIO_PLACEHOLDER,
        STUDIO_PLACEHOLDER_VALUE,
        SUBMITTER_LEGACY_ROLE_ID,
    },
    traits::{LegacyStoreDatabase, NewComponentInquiry, NewResource, ResourceApiError, ResourceAttribute},
};

/// The format the legacy store expects for the registration date attribute.
const REGISTRATION_DATE_FORMAT: &str = "%m.%d.%Y %I:%M %p";

/// `RegistrationApi` runs the registration workflow for submitter-role assignments: a linear state
/// machine that is terminal on the first failed pre-check and applies the bookkeeping side effects
/// in order. There is no automatic rollback of committed steps; redelivery converges because every
/// step is idempotent or guarded by an existence check.
pub struct RegistrationApi<B> {
    db: B,
    forum: Arc<dyn ForumService>,
}

impl<B> Debug for RegistrationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RegistrationApi")
    }
}

impl<B> RegistrationApi<B> {
    pub fn new(db: B, forum: Arc<dyn ForumService>) -> Self {
        Self { db, forum }
    }
}

impl<B> RegistrationApi<B>
where B: LegacyStoreDatabase
{
    /// Registers `user_id` as a submitter on the challenge.
    ///
    /// `admin_caller` skips the group eligibility check, mirroring what the platform allows
    /// administrators to do on behalf of members.
    ///
    /// Returns the resource id. A concurrent duplicate registration is absorbed and reported as
    /// success with the existing id.
    pub async fn register(
        &self,
        legacy_id: LegacyId,
        user_id: UserId,
        admin_caller: bool,
    ) -> Result<i64, WorkflowError> {
        // Step 1: account must be active.
        if !self.db.check_user_activated(user_id).await? {
            return Err(RegistrationRejection::UserNotActivated.into());
        }
        // Step 2: the challenge must exist in the legacy store.
        let studio = self
            .db
            .challenge_exists(legacy_id)
            .await?
            .ok_or(RegistrationRejection::ChallengeNotFound(legacy_id))?;
        // Step 3: group eligibility, unless an administrator is registering the member.
        if !admin_caller {
            let groups = self.db.challenge_group_restrictions(legacy_id).await?;
            if !groups.is_empty() && !self.db.user_in_any_group(user_id, &groups).await? {
                return Err(RegistrationRejection::NotEligible.into());
            }
        }
        // Step 4: the combined pre-checks.
        let validation = self.db.validate_registration(legacy_id, user_id).await?;
        if !validation.registration_open {
            return Err(RegistrationRejection::RegistrationClosed.into());
        }
        if validation.user_registered {
            return Err(RegistrationRejection::AlreadyRegistered.into());
        }
        if validation.user_suspended {
            return Err(RegistrationRejection::Suspended.into());
        }
        if validation.user_country_banned {
            return Err(RegistrationRejection::CountryBanned.into());
        }
        if validation.user_country_missing {
            return Err(RegistrationRejection::CountryMissing.into());
        }
        if validation.project_category_id == COPILOT_POSTING_PROJECT_CATEGORY && !validation.user_is_copilot {
            return Err(RegistrationRejection::CopilotPoolOnly.into());
        }
        // Step 5: terms of use.
        if !self.db.all_terms_agreed(legacy_id, user_id, SUBMITTER_LEGACY_ROLE_ID).await? {
            return Err(RegistrationRejection::TermsNotAgreed.into());
        }
        trace!("🔄️📋️ User {user_id} passed all registration pre-checks on {legacy_id}");

        // Step 6: the component inquiry, recorded for both tracks. The user's rating lives at
        // the phase derived from the component's project category, not at the component's own
        // phase, and the inquiry carries it whether or not it suits the challenge.
        let mut rating: Option<i64> = None;
        let mut reliability: Option<f64> = None;
        if let Some(component) = self.db.component_info(legacy_id).await? {
            let user_rating = self.db.user_rating(user_id, component.rating_phase()).await?;
            let inquiry = NewComponentInquiry {
                component_id: component.component_id,
                user_id,
                comment: component.comments.clone(),
                rating: user_rating,
                phase: Some(component.phase_id),
                version: component.version,
                project_id: legacy_id,
            };
            self.db.insert_component_inquiry(inquiry).await?;
            // Step 7: the challenge result belongs to the software track only. The recorded
            // rating is nulled when the component's phase does not pair with the category.
            if !studio {
                reliability = self.db.user_reliability(user_id, component.rating_phase()).await?;
                let suitable = rating_suits_phase(validation.project_category_id, component.phase_id);
                if !suitable && user_rating.is_some() {
                    debug!(
                        "🔄️📋️ Component phase {} does not pair with category {}. Recording a null rating for \
                         user {user_id} on {legacy_id}",
                        component.phase_id, validation.project_category_id
                    );
                }
                let result_rating = if suitable { user_rating } else { None };
                self.db.insert_challenge_result(legacy_id, user_id, result_rating).await?;
                rating = result_rating;
            }
        } else if !studio {
            self.db.insert_challenge_result(legacy_id, user_id, None).await?;
        }

        // Step 8: the resource row with its typed attributes.
        let handle = self.db.user_handle(user_id).await?.unwrap_or_else(|| user_id.to_string());
        let mut attributes = vec![
            ResourceAttribute::new(RESOURCE_INFO_EXTERNAL_REF, user_id.to_string()),
            ResourceAttribute::new(RESOURCE_INFO_HANDLE, handle),
            ResourceAttribute::new(
                RESOURCE_INFO_REGISTRATION_DATE,
                Utc::now().format(REGISTRATION_DATE_FORMAT).to_string(),
            ),
            ResourceAttribute::new(RESOURCE_INFO_APPEALS_COMPLETED, APPEALS_COMPLETED_NO),
        ];
        if let Some(r) = rating.filter(|r| *r > 0) {
            attributes.push(ResourceAttribute::new(RESOURCE_INFO_RATING, r.to_string()));
        }
        if let Some(rel) = reliability {
            attributes.push(ResourceAttribute::new(RESOURCE_INFO_RELIABILITY, format!("{:.0}", rel * 100.0)));
        }
        if studio {
            attributes.push(ResourceAttribute::new(RESOURCE_INFO_STUDIO_PLACEHOLDER, STUDIO_PLACEHOLDER_VALUE));
        }
        let new_resource = NewResource {
            project_id: legacy_id,
            resource_role_id: SUBMITTER_LEGACY_ROLE_ID,
            user_id,
            operator_id: user_id,
            attributes,
        };
        let resource_id = match self.db.create_resource(new_resource).await {
            Ok(id) => id,
            Err(ResourceApiError::AlreadyExists(id)) => {
                info!("🔄️📋️ User {user_id} raced another registration on {legacy_id}; keeping resource {id}");
                return Ok(id);
            },
            Err(e) => return Err(e.into()),
        };
        self.db
            .audit_resource_action(legacy_id, user_id, SUBMITTER_LEGACY_ROLE_ID, AuditAction::Create, user_id)
            .await?;

        // Step 9: exactly one timeline notification.
        self.db.enable_timeline_notification(legacy_id, user_id, user_id).await?;

        // Forum bootstrap for the software track. Non-critical: log and carry on.
        if !studio {
            if let Some(category) = self.forum_category(legacy_id).await? {
                if let Err(e) = self.forum.watch_category(category, user_id).await {
                    warn!("🔄️📋️ Forum watch for user {user_id} on category {category} failed: {e}");
                }
                let role = format!("Software_Users_{category}");
                if let Err(e) = self.forum.grant_user_role(category, &role, user_id).await {
                    warn!("🔄️📋️ Forum role grant for user {user_id} on category {category} failed: {e}");
                }
            }
        }
        debug!("🔄️📋️ User {user_id} registered on {legacy_id} with resource {resource_id}");
        Ok(resource_id)
    }

    async fn forum_category(&self, legacy_id: LegacyId) -> Result<Option<i64>, WorkflowError> {
        if let Some(category) = self.db.challenge_forum_category(legacy_id).await? {
            return Ok(Some(category));
        }
        match self.db.component_info(legacy_id).await? {
            Some(component) => Ok(self.db.active_forum_category(component.component_id).await?),
            None => Ok(None),
        }
    }
}

/// The legacy rating-suitability table: a component-testing challenge pairs with the development
/// rating phase; every other category pairs with `category + 111`.
pub fn rating_suits_phase(project_category_id: i64, phase_id: i64) -> bool {
    if project_category_id == COMPONENT_TESTING_PROJECT_CATEGORY {
        phase_id == DEVELOPMENT_PHASE_ID
    } else {
        project_category_id + RATING_PHASE_OFFSET == phase_id
    }
}

#[cfg(test)]
mod test {
    use super::rating_suits_phase;
    use crate::db_types::{COMPONENT_TESTING_PROJECT_CATEGORY, DESIGN_PROJECT_CATEGORY, DEVELOPMENT_PROJECT_CATEGORY};

    #[test]
    fn rating_suitability_table() {
        assert!(rating_suits_phase(DESIGN_PROJECT_CATEGORY, 112));
        assert!(rating_suits_phase(DEVELOPMENT_PROJECT_CATEGORY, 113));
        assert!(!rating_suits_phase(DESIGN_PROJECT_CATEGORY, 113));
        // Component testing pairs with the development phase, not category + 111.
        assert!(rating_suits_phase(COMPONENT_TESTING_PROJECT_CATEGORY, 113));
        assert!(!rating_suits_phase(COMPONENT_TESTING_PROJECT_CATEGORY, 116));
    }
}
