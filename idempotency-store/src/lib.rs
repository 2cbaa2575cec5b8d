//! # Idempotency store
//!
//! At-most-once execution guard for payment operations. Every mutating
//! payment endpoint carries an idempotency key; the store guarantees that a
//! given key maps to at most one (request hash, response) pair for its
//! lifetime, so client retries and network-level request duplication never
//! produce a second charge.
//!
//! # Invariants
//!
//! - First-writer-wins: concurrent `set` calls for one key admit exactly one
//!   writer; the rest observe the stored record
//! - A key is never silently re-bound: a `set` with a different request hash
//!   is a conflict, not an overwrite
//! - Expired records are invisible to readers and deleted only once their
//!   TTL has elapsed

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod error;
pub mod hashing;
pub mod keys;
pub mod metrics;
pub mod store;

pub use error::{Error, Result};
pub use hashing::{canonical_bytes, content_hash};
pub use keys::IdempotencyKey;
pub use store::{
    IdempotencyRecord, IdempotencyStore, SetOutcome, StoreConfig, StoredResponse,
};

/// Default record TTL (24 hours)
pub const DEFAULT_TTL_SECS: u64 = 86_400;
