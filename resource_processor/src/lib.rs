//! Legacy Resource Processor
//!
//! The process wrapper around [`resource_engine`]: it consumes challenge-resource events from the
//! message bus, resolves the referenced challenge and role against the upstream platform, and
//! routes each message into the engine's reconciliation flows. Outbound traffic (readiness
//! requeues and unregistration notices) goes back out through the same bus port.
pub mod bus;
pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod messages;
pub mod upstream;
