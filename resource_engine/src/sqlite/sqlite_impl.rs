//! `SqliteDatabase` is a concrete legacy-store backend.
//!
//! Unsurprisingly, it uses SQLite and implements all the traits defined in the [`crate::traits`]
//! module.
use std::fmt::Debug;

use log::*;
use lrp_common::Amount;
use sqlx::SqlitePool;

use super::db::{db_url, new_pool, notifications, payments, registration, resources, sequences};
use crate::{
    db_types::{
        AuditAction,
        ComponentInfo,
        LegacyId,
        LegacyRole,
        PaymentType,
        RegistrationValidation,
        Resource,
        ResourcePaymentRow,
        ReviewerPayment,
        UnregistrationValidation,
        UserId,
    },
    traits::{
        LegacyStoreDatabase,
        NewComponentInquiry,
        NewResource,
        NotificationApiError,
        NotificationManagement,
        PaymentApiError,
        PaymentManagement,
        RegistrationApiError,
        RegistrationManagement,
        ResourceApiError,
        ResourceManagement,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl LegacyStoreDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }
}

impl ResourceManagement for SqliteDatabase {
    async fn fetch_resource(
        &self,
        project_id: LegacyId,
        legacy_role_id: i64,
        user_id: UserId,
    ) -> Result<Option<Resource>, ResourceApiError> {
        let mut conn = self.pool.acquire().await?;
        let resource = resources::fetch_resource(project_id, legacy_role_id, user_id, &mut conn).await?;
        Ok(resource)
    }

    async fn fetch_user_resources(
        &self,
        project_id: LegacyId,
        user_id: UserId,
    ) -> Result<Vec<Resource>, ResourceApiError> {
        let mut conn = self.pool.acquire().await?;
        let result = resources::fetch_user_resources(project_id, user_id, &mut conn).await?;
        Ok(result)
    }

    async fn resources_with_payments_by_roles(
        &self,
        project_id: LegacyId,
        legacy_role_ids: &[i64],
    ) -> Result<Vec<ResourcePaymentRow>, ResourceApiError> {
        let mut conn = self.pool.acquire().await?;
        let rows = resources::resources_with_payments_by_roles(project_id, legacy_role_ids, &mut conn).await?;
        Ok(rows)
    }

    async fn fetch_legacy_role(&self, legacy_role_id: i64) -> Result<Option<LegacyRole>, ResourceApiError> {
        let mut conn = self.pool.acquire().await?;
        let role = resources::fetch_legacy_role(legacy_role_id, &mut conn).await?;
        Ok(role)
    }

    /// Allocates the resource id, inserts the resource row and all attribute rows in a single
    /// transaction. Rolls back entirely on any failure, including a duplicate triple.
    async fn create_resource(&self, resource: NewResource) -> Result<i64, ResourceApiError> {
        let mut tx = self.pool.begin().await?;
        let resource_id = sequences::next_val(sequences::RESOURCE_ID_SEQ, &mut tx).await?;
        resources::insert_resource(resource_id, &resource, &mut tx).await?;
        for attr in &resource.attributes {
            resources::insert_attribute(resource_id, attr.type_id, &attr.value, resource.operator_id, &mut tx).await?;
        }
        tx.commit().await?;
        debug!(
            "🗃️ Resource {resource_id} created on {} for user {} with role {} ({} attributes)",
            resource.project_id,
            resource.user_id,
            resource.resource_role_id,
            resource.attributes.len()
        );
        Ok(resource_id)
    }

    async fn cascade_delete_resource(&self, resource_id: i64) -> Result<(), ResourceApiError> {
        let mut tx = self.pool.begin().await?;
        resources::cascade_delete(resource_id, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn audit_resource_action(
        &self,
        project_id: LegacyId,
        user_id: UserId,
        legacy_role_id: i64,
        action: AuditAction,
        operator_id: UserId,
    ) -> Result<i64, ResourceApiError> {
        let mut tx = self.pool.begin().await?;
        let audit_id =
            resources::insert_audit_record(project_id, user_id, legacy_role_id, action, operator_id, &mut tx).await?;
        tx.commit().await?;
        trace!("🗃️ Audit #{audit_id}: {action} of role {legacy_role_id} for user {user_id} on {project_id}");
        Ok(audit_id)
    }
}

impl RegistrationManagement for SqliteDatabase {
    async fn check_user_activated(&self, user_id: UserId) -> Result<bool, RegistrationApiError> {
        let mut conn = self.pool.acquire().await?;
        let activated = registration::check_user_activated(user_id, &mut conn).await?;
        Ok(activated)
    }

    async fn user_handle(&self, user_id: UserId) -> Result<Option<String>, RegistrationApiError> {
        let mut conn = self.pool.acquire().await?;
        let handle = registration::user_handle(user_id, &mut conn).await?;
        Ok(handle)
    }

    async fn challenge_exists(&self, project_id: LegacyId) -> Result<Option<bool>, RegistrationApiError> {
        let mut conn = self.pool.acquire().await?;
        let studio = registration::challenge_exists(project_id, &mut conn).await?;
        Ok(studio)
    }

    async fn challenge_group_restrictions(&self, project_id: LegacyId) -> Result<Vec<i64>, RegistrationApiError> {
        let mut conn = self.pool.acquire().await?;
        let groups = registration::challenge_group_restrictions(project_id, &mut conn).await?;
        Ok(groups)
    }

    async fn user_in_any_group(&self, user_id: UserId, groups: &[i64]) -> Result<bool, RegistrationApiError> {
        let mut conn = self.pool.acquire().await?;
        let found = registration::user_in_any_group(user_id, groups, &mut conn).await?;
        Ok(found)
    }

    async fn validate_registration(
        &self,
        project_id: LegacyId,
        user_id: UserId,
    ) -> Result<RegistrationValidation, RegistrationApiError> {
        let mut conn = self.pool.acquire().await?;
        let validation = registration::validate_registration(project_id, user_id, &mut conn).await?;
        Ok(validation)
    }

    async fn all_terms_agreed(
        &self,
        project_id: LegacyId,
        user_id: UserId,
        legacy_role_id: i64,
    ) -> Result<bool, RegistrationApiError> {
        let mut conn = self.pool.acquire().await?;
        let agreed = registration::all_terms_agreed(project_id, user_id, legacy_role_id, &mut conn).await?;
        Ok(agreed)
    }

    async fn is_copilot(&self, user_id: UserId) -> Result<bool, RegistrationApiError> {
        let mut conn = self.pool.acquire().await?;
        let copilot = registration::is_copilot(user_id, &mut conn).await?;
        Ok(copilot)
    }

    async fn component_info(&self, project_id: LegacyId) -> Result<Option<ComponentInfo>, RegistrationApiError> {
        let mut conn = self.pool.acquire().await?;
        let info = registration::component_info(project_id, &mut conn).await?;
        Ok(info)
    }

    async fn user_rating(&self, user_id: UserId, phase_id: i64) -> Result<Option<i64>, RegistrationApiError> {
        let mut conn = self.pool.acquire().await?;
        let rating = registration::user_rating(user_id, phase_id, &mut conn).await?;
        Ok(rating)
    }

    async fn user_reliability(&self, user_id: UserId, phase_id: i64) -> Result<Option<f64>, RegistrationApiError> {
        let mut conn = self.pool.acquire().await?;
        let reliability = registration::user_reliability(user_id, phase_id, &mut conn).await?;
        Ok(reliability)
    }

    async fn insert_component_inquiry(&self, inquiry: NewComponentInquiry) -> Result<i64, RegistrationApiError> {
        let mut tx = self.pool.begin().await?;
        let inquiry_id = registration::insert_component_inquiry(&inquiry, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Component inquiry #{inquiry_id} recorded for user {} on {}", inquiry.user_id, inquiry.project_id);
        Ok(inquiry_id)
    }

    async fn insert_challenge_result(
        &self,
        project_id: LegacyId,
        user_id: UserId,
        rating: Option<i64>,
    ) -> Result<(), RegistrationApiError> {
        let mut conn = self.pool.acquire().await?;
        registration::insert_challenge_result(project_id, user_id, rating, &mut conn).await?;
        Ok(())
    }

    async fn delete_registration_rows(
        &self,
        project_id: LegacyId,
        user_id: UserId,
    ) -> Result<(), RegistrationApiError> {
        let mut tx = self.pool.begin().await?;
        registration::delete_registration_rows(project_id, user_id, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn validate_unregistration(
        &self,
        project_id: LegacyId,
        user_id: UserId,
    ) -> Result<Option<UnregistrationValidation>, RegistrationApiError> {
        let mut conn = self.pool.acquire().await?;
        let validation = registration::validate_unregistration(project_id, user_id, &mut conn).await?;
        Ok(validation)
    }

    async fn active_forum_category(&self, component_id: i64) -> Result<Option<i64>, RegistrationApiError> {
        let mut conn = self.pool.acquire().await?;
        let category = registration::active_forum_category(component_id, &mut conn).await?;
        Ok(category)
    }

    async fn challenge_forum_category(&self, project_id: LegacyId) -> Result<Option<i64>, RegistrationApiError> {
        let mut conn = self.pool.acquire().await?;
        let category = registration::challenge_forum_category(project_id, &mut conn).await?;
        Ok(category)
    }
}

impl NotificationManagement for SqliteDatabase {
    async fn has_timeline_notification(
        &self,
        project_id: LegacyId,
        user_id: UserId,
    ) -> Result<bool, NotificationApiError> {
        let mut conn = self.pool.acquire().await?;
        let exists = notifications::has_timeline_notification(project_id, user_id, &mut conn).await?;
        Ok(exists)
    }

    async fn enable_timeline_notification(
        &self,
        project_id: LegacyId,
        user_id: UserId,
        operator_id: UserId,
    ) -> Result<bool, NotificationApiError> {
        let mut conn = self.pool.acquire().await?;
        let created =
            notifications::enable_timeline_notification(project_id, user_id, operator_id, &mut conn).await?;
        if created {
            debug!("🗃️ Timeline notification enabled for user {user_id} on {project_id}");
        }
        Ok(created)
    }

    async fn disable_timeline_notification(
        &self,
        project_id: LegacyId,
        user_id: UserId,
    ) -> Result<u64, NotificationApiError> {
        let mut conn = self.pool.acquire().await?;
        let removed = notifications::disable_timeline_notification(project_id, user_id, &mut conn).await?;
        Ok(removed)
    }
}

impl PaymentManagement for SqliteDatabase {
    async fn insert_resource_payment(
        &self,
        resource_id: i64,
        amount: Amount,
        payment_type_id: i64,
        payment_type: PaymentType,
        operator_id: UserId,
    ) -> Result<i64, PaymentApiError> {
        let mut tx = self.pool.begin().await?;
        let payment_id =
            payments::insert_resource_payment(resource_id, amount, payment_type_id, payment_type, operator_id, &mut tx)
                .await?;
        tx.commit().await?;
        Ok(payment_id)
    }

    async fn update_payment_amount(
        &self,
        project_payment_id: i64,
        amount: Amount,
        operator_id: UserId,
    ) -> Result<(), PaymentApiError> {
        let mut conn = self.pool.acquire().await?;
        let updated = payments::update_payment_amount(project_payment_id, amount, operator_id, &mut conn).await?;
        if updated == 0 {
            return Err(PaymentApiError::PaymentNotFound(project_payment_id));
        }
        debug!("🗃️ Payment #{project_payment_id} amount updated to {amount}");
        Ok(())
    }

    async fn remove_payment_for_resource(&self, resource_id: i64) -> Result<u64, PaymentApiError> {
        let mut conn = self.pool.acquire().await?;
        let removed = payments::remove_payment_for_resource(resource_id, &mut conn).await?;
        Ok(removed)
    }

    async fn fetch_payment_for_resource(
        &self,
        resource_id: i64,
    ) -> Result<Option<ReviewerPayment>, PaymentApiError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_payment_for_resource(resource_id, &mut conn).await?;
        Ok(payment)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the url from the environment.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
