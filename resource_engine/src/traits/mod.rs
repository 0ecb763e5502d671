//! # Legacy store management and control.
//!
//! This module defines the interface contracts that a legacy-store *backend* must expose in order
//! to drive the resource reconciliation flows.
//!
//! ## Traits
//! * [`ResourceManagement`] covers the resource table and its dependents: existence checks,
//!   creation with typed attributes, cascaded deletion and the audit trail.
//! * [`RegistrationManagement`] covers the queries and writes used by the registration and
//!   unregistration workflows (eligibility, terms, component bookkeeping, forum categories).
//! * [`NotificationManagement`] covers the timeline notification table.
//! * [`PaymentManagement`] covers reviewer/copilot payment rows.
//! * [`LegacyStoreDatabase`] is the umbrella trait the flow APIs are generic over.
mod data_objects;
mod legacy_store_database;
mod notification_management;
mod payment_management;
mod registration_management;
mod resource_management;

pub use data_objects::{NewComponentInquiry, NewResource, ResourceAttribute};
pub use legacy_store_database::LegacyStoreDatabase;
pub use notification_management::{NotificationApiError, NotificationManagement};
pub use payment_management::{PaymentApiError, PaymentManagement};
pub use registration_management::{RegistrationApiError, RegistrationManagement};
pub use resource_management::{ResourceApiError, ResourceManagement};
