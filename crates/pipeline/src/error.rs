//! Pipeline error types

use contracts::PipelineState;
use thiserror::Error;

/// Boxed error returned by fallible transforms
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Pipeline-specific errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// `start` called on a pipeline without stages
    #[error("pipeline has no stages")]
    NoStages,

    /// Control call not allowed in the current state
    #[error("protocol violation: cannot {operation} a {state} pipeline")]
    ProtocolViolation {
        operation: &'static str,
        state: PipelineState,
    },

    /// The dispatcher task ended without reaching `Stopped`
    #[error("pipeline dispatcher is no longer running")]
    DispatcherGone,
}

impl PipelineError {
    /// Create a protocol violation error
    pub fn protocol_violation(operation: &'static str, state: PipelineState) -> Self {
        Self::ProtocolViolation { operation, state }
    }

    /// Whether this is a protocol violation
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::ProtocolViolation { .. })
    }
}
