//! Error types for the rate limiter

use thiserror::Error;

/// Result type for rate limiter operations
pub type Result<T> = std::result::Result<T, Error>;

/// Rate limiter errors
///
/// Violations are not errors; they surface as
/// [`crate::Decision::Denied`]. These are infrastructure failures only.
#[derive(Error, Debug)]
pub enum Error {
    /// Shared counter store failure
    #[error("counter store error: {0}")]
    Backend(#[from] redis::RedisError),

    /// Counter bookkeeping failure
    #[error("counter error: {0}")]
    Counter(String),

    /// Amount not representable in minor units
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
