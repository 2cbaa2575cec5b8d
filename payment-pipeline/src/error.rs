//! Error types for the payment pipeline

use rate_limiter::ViolationKind;
use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline errors, each mapping to a definite client-visible outcome —
/// a condition this core can classify never surfaces as an ambiguous 500.
#[derive(Error, Debug)]
pub enum Error {
    /// Same idempotency key re-used with a different payload
    #[error("idempotency conflict for key {key}")]
    Conflict {
        /// The contested key
        key: String,
    },

    /// Rate limit violation
    #[error("rate limited ({kind}): {message}")]
    RateLimited {
        /// Violation class
        kind: ViolationKind,
        /// Remediation message naming the breached window
        message: String,
    },

    /// Business handler failure, propagated as-is
    #[error("payment handler error: {0}")]
    Handler(String),

    /// Idempotency store failure
    #[error("idempotency store error: {0}")]
    Idempotency(#[from] idempotency_store::Error),

    /// Rate limiter infrastructure failure
    #[error("rate limiter error: {0}")]
    RateLimiter(#[from] rate_limiter::Error),
}
