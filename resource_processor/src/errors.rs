use resource_engine::WorkflowError;
use thiserror::Error;

use crate::{bus::BusError, upstream::UpstreamError};

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Could not initialize the processor. {0}")]
    InitializeError(String),
    #[error("Message bus error. {0}")]
    Bus(#[from] BusError),
    #[error("Upstream API error. {0}")]
    Upstream(#[from] UpstreamError),
    #[error("Workflow error. {0}")]
    Workflow(#[from] WorkflowError),
    #[error("Could not serialize an outbound message. {0}")]
    Serialization(#[from] serde_json::Error),
}
