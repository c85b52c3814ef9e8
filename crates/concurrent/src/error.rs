//! Error types for the concurrency primitives

use thiserror::Error;

/// Errors returned by `MutexGroup` and `RateLimiter`
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConcurrentError {
    /// Name already registered in a `MutexGroup`
    #[error("mutex already registered: {name}")]
    AlreadyRegistered { name: String },

    /// Name unknown to a `MutexGroup`
    #[error("mutex not registered: {name}")]
    NotRegistered { name: String },

    /// Non-blocking acquisition would have to wait
    #[error("resource is busy")]
    WouldBlock,

    /// The rate limiter was shut down
    #[error("rate limiter is shut down")]
    Shutdown,

    /// Rate limiter built with zero permits or a zero period
    #[error("invalid rate: {permits} permits per {period_ms}ms")]
    InvalidRate { permits: u32, period_ms: u128 },
}

impl ConcurrentError {
    pub fn already_registered(name: impl Into<String>) -> Self {
        Self::AlreadyRegistered { name: name.into() }
    }

    pub fn not_registered(name: impl Into<String>) -> Self {
        Self::NotRegistered { name: name.into() }
    }

    pub fn invalid_rate(permits: u32, period: std::time::Duration) -> Self {
        Self::InvalidRate {
            permits,
            period_ms: period.as_millis(),
        }
    }
}

/// Result alias for this crate
pub type Result<T> = std::result::Result<T, ConcurrentError>;
