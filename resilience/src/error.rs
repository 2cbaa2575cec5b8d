//! Error types for resilience primitives

use thiserror::Error;

/// Result type for resilience operations
pub type Result<T> = std::result::Result<T, Error>;

/// Resilience errors
#[derive(Error, Debug)]
pub enum Error {
    /// Circuit open, call rejected without invoking the provider
    #[error("circuit open for provider {provider}: {reason}")]
    CircuitOpen {
        /// Provider key
        provider: String,
        /// Reason, including remaining cool-down
        reason: String,
    },

    /// Retry budget exhausted
    #[error("retry exhausted after {attempts} attempts: {last_error}")]
    RetryExhausted {
        /// Attempts made
        attempts: u32,
        /// Final error message
        last_error: String,
    },
}

/// Classified failure returned by a wrapped provider call.
///
/// The caller decides the class: transport-level failures (network errors,
/// timeouts) are retryable and feed the circuit breaker; validation and
/// business-rule failures propagate on first occurrence and are never
/// retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    /// Transport failure, eligible for retry
    #[error("transport error: {0}")]
    Retryable(String),

    /// Validation or business-rule failure, never retried
    #[error("non-retryable error: {0}")]
    NonRetryable(String),
}

impl CallError {
    /// Whether this failure consumes a retry attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CallError::Retryable(_))
    }
}
