//! Error types for CLI operations.

use concurrent::ConcurrentError;
use pipeline::PipelineError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Pipeline start or control failure
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Input feeder failure
    #[error("Input feeder failed: {0}")]
    Feeder(#[from] ConcurrentError),

    /// Metrics exporter setup failure
    #[error("Failed to start metrics exporter: {message}")]
    Metrics { message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn metrics(message: impl Into<String>) -> Self {
        Self::Metrics {
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
