//! Error types for the governance layer
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Governor Error Enum ==
/// Unified error type for the cache, rate limiter and governor.
///
/// Rate-limit and configuration errors are produced by this crate.
/// Execution failures wrap the executor's own error untouched, so callers can
/// tell a failing resource apart from the governance layer refusing work.
#[derive(Error, Debug)]
pub enum GovernorError {
    /// The request was throttled by the global or operation bucket
    #[error("Rate limit exceeded for '{operation}': retry after {retry_after:.3}s")]
    RateLimitExceeded {
        /// Operation that was throttled
        operation: String,
        /// Estimated seconds until enough tokens are available
        retry_after: f64,
    },

    /// Configuration rejected at construction time
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The executor failed; never cached, never retried here
    #[error(transparent)]
    ExecutionFailure(anyhow::Error),
}

impl GovernorError {
    /// Retry-after estimate in seconds, for rate-limit errors.
    pub fn retry_after(&self) -> Option<f64> {
        match self {
            GovernorError::RateLimitExceeded { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// True when the error came from the executor rather than this layer.
    pub fn is_execution_failure(&self) -> bool {
        matches!(self, GovernorError::ExecutionFailure(_))
    }

    /// Short category label used in telemetry records.
    pub fn category(&self) -> &'static str {
        match self {
            GovernorError::RateLimitExceeded { .. } => "rate_limited",
            GovernorError::InvalidConfiguration(_) => "invalid_configuration",
            GovernorError::ExecutionFailure(_) => "execution_failure",
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the governance layer.
pub type Result<T> = std::result::Result<T, GovernorError>;
