use lrp_common::Amount;
use thiserror::Error;

use crate::db_types::{PaymentType, ReviewerPayment, UserId};

/// Behaviour for the project payment table.
///
/// Payment rows hang off a resource, so removal must happen before the resource itself is
/// deleted. Payment ids are assigned as max+1 at insert time.
#[allow(async_fn_in_trait)]
pub trait PaymentManagement: Clone {
    /// Inserts a payment row for the resource. Returns the new payment id.
    async fn insert_resource_payment(
        &self,
        resource_id: i64,
        amount: Amount,
        payment_type_id: i64,
        payment_type: PaymentType,
        operator_id: UserId,
    ) -> Result<i64, PaymentApiError>;

    /// Updates the stored amount on an existing payment row.
    async fn update_payment_amount(
        &self,
        project_payment_id: i64,
        amount: Amount,
        operator_id: UserId,
    ) -> Result<(), PaymentApiError>;

    /// Removes any payment rows attached to the resource. Returns the number of rows deleted.
    async fn remove_payment_for_resource(&self, resource_id: i64) -> Result<u64, PaymentApiError>;

    async fn fetch_payment_for_resource(&self, resource_id: i64)
        -> Result<Option<ReviewerPayment>, PaymentApiError>;
}

#[derive(Debug, Clone, Error)]
pub enum PaymentApiError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("Payment {0} does not exist")]
    PaymentNotFound(i64),
}

impl From<sqlx::Error> for PaymentApiError {
    fn from(e: sqlx::Error) -> Self {
        PaymentApiError::DatabaseError(e.to_string())
    }
}
