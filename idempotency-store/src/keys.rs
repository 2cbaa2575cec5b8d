//! Idempotency key generation and parsing
//!
//! Wire format `{operation_type}_{uuid}`: the deterministic prefix routes
//! and debugs, the v4 suffix carries the entropy. Server-generated keys and
//! client-supplied `Idempotency-Key` header values share the format.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Validated idempotency key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Generate a fresh key for `operation_type`.
    pub fn generate(operation_type: &str) -> Self {
        Self(format!("{}_{}", operation_type, Uuid::new_v4()))
    }

    /// Parse and validate a wire-format key.
    pub fn parse(raw: &str) -> Result<Self> {
        let (operation_type, suffix) = raw
            .rsplit_once('_')
            .ok_or_else(|| Error::InvalidKey(format!("missing '_' separator: {raw}")))?;

        if operation_type.is_empty() {
            return Err(Error::InvalidKey(format!("empty operation type: {raw}")));
        }
        Uuid::parse_str(suffix)
            .map_err(|e| Error::InvalidKey(format!("bad uuid suffix in {raw}: {e}")))?;

        Ok(Self(raw.to_string()))
    }

    /// Operation type prefix.
    pub fn operation_type(&self) -> &str {
        // Always present: both constructors guarantee the separator
        self.0.rsplit_once('_').map(|(op, _)| op).unwrap_or(&self.0)
    }

    /// Raw key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
