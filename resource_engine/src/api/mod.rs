//! The engine's public flow APIs.
//!
//! Each API is generic over a [`crate::traits::LegacyStoreDatabase`] backend. The orchestrator
//! ([`ResourceFlowApi`]) owns the registration and unregistration workflows and routes
//! submitter-role traffic to them.
pub mod collaborators;
pub mod errors;
mod payment_ledger_api;
mod registration_api;
mod resource_flow_api;
mod unregistration_api;

pub use payment_ledger_api::PaymentLedgerApi;
pub use registration_api::{rating_suits_phase, RegistrationApi};
pub use resource_flow_api::ResourceFlowApi;
pub use unregistration_api::UnregistrationApi;
