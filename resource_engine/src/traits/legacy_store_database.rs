use crate::traits::{NotificationManagement, PaymentManagement, RegistrationManagement, ResourceManagement};

/// The umbrella trait for legacy-store backends. The flow APIs are generic over this trait, so a
/// backend only needs to implement the four management traits to drive the whole processor.
pub trait LegacyStoreDatabase:
    Clone + ResourceManagement + RegistrationManagement + NotificationManagement + PaymentManagement
{
    /// The URL of the backing database.
    fn url(&self) -> &str;
}
