//! Layered error definitions
//!
//! Categorized by source: config / operation / io

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Operation Errors =====
    /// Arithmetic operation failed (overflow, division by zero)
    #[error("operation '{operation}' failed on input {input}: {message}")]
    Arithmetic {
        operation: String,
        input: i64,
        message: String,
    },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create arithmetic operation error
    pub fn arithmetic(
        operation: impl Into<String>,
        input: i64,
        message: impl Into<String>,
    ) -> Self {
        Self::Arithmetic {
            operation: operation.into(),
            input,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_names_field() {
        let err = ContractError::config_validation("stages[0].name", "must not be empty");
        assert_eq!(
            err.to_string(),
            "config validation error at 'stages[0].name': must not be empty"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ContractError = io.into();
        assert!(matches!(err, ContractError::Io(_)));
    }
}
