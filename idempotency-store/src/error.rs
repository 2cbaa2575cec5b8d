//! Error types for the idempotency store

use thiserror::Error;

/// Result type for idempotency operations
pub type Result<T> = std::result::Result<T, Error>;

/// Idempotency store errors
#[derive(Error, Debug)]
pub enum Error {
    /// Same key re-used with a different request payload
    #[error("idempotency conflict: key {key} already bound to a different request")]
    Conflict {
        /// The contested key
        key: String,
    },

    /// Malformed idempotency key
    #[error("invalid idempotency key: {0}")]
    InvalidKey(String),

    /// Storage error (RocksDB)
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
