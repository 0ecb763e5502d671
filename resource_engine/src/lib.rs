//! Legacy Resource Engine
//!
//! The core library of the challenge resource processor. It reconciles authoritative
//! challenge-resource events into a legacy relational system of record, applying the side effects
//! (notifications, forum permissions, payment records, audit trail) consistently.
//!
//! The library is divided into two main sections:
//! 1. The legacy store ([`traits`] and the SQLite backend). The flow APIs never touch tables
//!    directly; backends implement the trait family in [`traits`] and everything else is generic
//!    over it.
//! 2. The flow APIs ([`ResourceFlowApi`], [`RegistrationApi`], [`UnregistrationApi`],
//!    [`PaymentLedgerApi`]). These carry the reconciliation semantics: idempotent assignment, loud
//!    removal, the registration state machine and payment reconciliation.
//!
//! The engine also emits events through a small hook system ([`events`]): subscribers receive
//! assignment, removal and unregistration events and can react without access to engine state.
mod api;
pub mod db_types;
pub mod events;
pub mod policy;
mod sqlite;
pub mod traits;

pub mod test_utils;

pub use api::{
    collaborators,
    errors::{RegistrationRejection, WorkflowError},
    rating_suits_phase,
    PaymentLedgerApi,
    RegistrationApi,
    ResourceFlowApi,
    UnregistrationApi,
};
pub use sqlite::SqliteDatabase;
