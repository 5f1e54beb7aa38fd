//! Error types for Windowguard.

use std::time::Duration;

use thiserror::Error;

/// Main error type for Windowguard operations.
#[derive(Error, Debug)]
pub enum LimiterError {
    /// Malformed or out-of-range limiter configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The operation's quota for the current window is exhausted
    #[error("Rate limit exceeded for '{key}': {limit} calls per {window:?}")]
    RateLimitExceeded {
        key: String,
        limit: u64,
        window: Duration,
    },

    /// Admission was requested for a key that was never wrapped
    #[error("Operation '{0}' is not registered with this limiter")]
    UnregisteredKey(String),
}

impl LimiterError {
    /// Whether this error is a quota rejection rather than a usage or setup failure.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, LimiterError::RateLimitExceeded { .. })
    }
}

/// Result type alias for Windowguard operations.
pub type Result<T> = std::result::Result<T, LimiterError>;
