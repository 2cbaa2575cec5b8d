//! Durable record storage
//!
//! # Column families
//!
//! - `records` - idempotency records (key: wire-format key string)
//! - `expiry`  - sweep index (key: big-endian expiry micros || key string)
//!
//! The store is the durable half of the at-most-once contract: it survives
//! process restarts and is shared by every worker, so the first-writer-wins
//! decision holds across horizontal scaling against one database.

use crate::{
    error::{Error, Result},
    keys::IdempotencyKey,
    metrics::{IDEMPOTENCY_CONFLICTS_TOTAL, IDEMPOTENT_REPLAYS_TOTAL},
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use resilience::Clock;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Column family names
const CF_RECORDS: &str = "records";
const CF_EXPIRY: &str = "expiry";

/// Width of the big-endian expiry prefix in index keys
const EXPIRY_PREFIX_LEN: usize = 8;

/// Response captured for replay, including the original status code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResponse {
    /// HTTP status code of the original response
    pub status_code: u16,
    /// Serialized response body
    pub body: String,
}

/// One key's binding: request hash in, response out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    /// Wire-format key
    pub key: String,
    /// Operation type prefix of the key
    pub operation_type: String,
    /// Owning user
    pub user_id: String,
    /// Content hash of the canonical request payload
    pub request_hash: String,
    /// Response to replay for duplicates
    pub response: StoredResponse,
    /// First write time
    pub created_at: DateTime<Utc>,
    /// Eligible for the sweep after this instant
    pub expires_at: DateTime<Utc>,
}

/// Outcome of a `set` that did not conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// This call was the first writer for the key
    FirstWrite,
    /// Key already bound with a matching hash; stored response untouched
    AlreadyRecorded,
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/idempotency"),
        }
    }
}

impl StoreConfig {
    /// Load from environment variables.
    pub fn from_env() -> Self {
        let mut config = StoreConfig::default();
        if let Ok(data_dir) = std::env::var("IDEMPOTENCY_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }
        config
    }
}

/// Durable idempotency store over RocksDB
pub struct IdempotencyStore {
    db: Arc<DB>,
    // Serializes the read-check-write in set/cleanup so exactly one writer
    // wins a contested key
    write_lock: Mutex<()>,
    clock: Arc<dyn Clock>,
}

impl IdempotencyStore {
    /// Open or create the database.
    pub fn open(config: &StoreConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_RECORDS, Self::cf_options_records()),
            ColumnFamilyDescriptor::new(CF_EXPIRY, Self::cf_options_expiry()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, &config.data_dir, cf_descriptors)?;

        info!(path = ?config.data_dir, "opened idempotency store");

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
            clock,
        })
    }

    fn cf_options_records() -> Options {
        let mut opts = Options::default();
        // Read on every payment request, favor decode speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_expiry() -> Options {
        // Scanned in order by the sweep, values are empty
        Options::default()
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("column family {} not found", name)))
    }

    fn expiry_key(expires_at: DateTime<Utc>, key: &str) -> Vec<u8> {
        let mut index_key = expires_at.timestamp_micros().to_be_bytes().to_vec();
        index_key.extend_from_slice(key.as_bytes());
        index_key
    }

    /// Look up a live record. Absent and expired keys both read as `None`,
    /// so callers treat them uniformly as "not a duplicate".
    pub fn get(&self, key: &IdempotencyKey) -> Result<Option<IdempotencyRecord>> {
        let cf = self.cf_handle(CF_RECORDS)?;

        let Some(bytes) = self.db.get_cf(cf, key.as_str().as_bytes())? else {
            return Ok(None);
        };

        let record: IdempotencyRecord = bincode::deserialize(&bytes)?;
        if record.expires_at <= self.clock.now() {
            return Ok(None);
        }

        IDEMPOTENT_REPLAYS_TOTAL.inc();
        Ok(Some(record))
    }

    /// Bind `key` to `(request_hash, response)` with first-writer-wins
    /// semantics.
    ///
    /// A repeat call with the same hash is an audit no-op; a repeat call
    /// with a different hash is a [`Error::Conflict`] and never replaces
    /// the stored response.
    pub fn set(
        &self,
        key: &IdempotencyKey,
        user_id: &str,
        request_hash: &str,
        response: &StoredResponse,
        ttl: Duration,
    ) -> Result<SetOutcome> {
        let _guard = self.write_lock.lock();
        let now = self.clock.now();

        let cf_records = self.cf_handle(CF_RECORDS)?;
        let cf_expiry = self.cf_handle(CF_EXPIRY)?;
        let mut batch = WriteBatch::default();

        if let Some(bytes) = self.db.get_cf(cf_records, key.as_str().as_bytes())? {
            let existing: IdempotencyRecord = bincode::deserialize(&bytes)?;

            if existing.expires_at > now {
                if existing.request_hash == request_hash {
                    debug!(key = %key, "duplicate set ignored, response already recorded");
                    return Ok(SetOutcome::AlreadyRecorded);
                }

                IDEMPOTENCY_CONFLICTS_TOTAL.inc();
                warn!(key = %key, "idempotency conflict: same key, different payload");
                return Err(Error::Conflict {
                    key: key.as_str().to_string(),
                });
            }

            // Replacing an expired record: retire its old index entry
            batch.delete_cf(cf_expiry, Self::expiry_key(existing.expires_at, key.as_str()));
        }

        let expires_at = now
            + chrono::Duration::from_std(ttl)
                .map_err(|e| Error::Storage(format!("ttl out of range: {e}")))?;

        let record = IdempotencyRecord {
            key: key.as_str().to_string(),
            operation_type: key.operation_type().to_string(),
            user_id: user_id.to_string(),
            request_hash: request_hash.to_string(),
            response: response.clone(),
            created_at: now,
            expires_at,
        };

        batch.put_cf(cf_records, key.as_str().as_bytes(), bincode::serialize(&record)?);
        batch.put_cf(cf_expiry, Self::expiry_key(expires_at, key.as_str()), &[]);
        self.db.write(batch)?;

        debug!(key = %key, user_id, "idempotency record stored");
        Ok(SetOutcome::FirstWrite)
    }

    /// Whether a cached response for `key` may be trusted for a request
    /// hashing to `request_hash`. `true` when no live record exists.
    pub fn check_request_match(&self, key: &IdempotencyKey, request_hash: &str) -> Result<bool> {
        Ok(self
            .get(key)?
            .map(|record| record.request_hash == request_hash)
            .unwrap_or(true))
    }

    /// Delete records whose TTL has elapsed; returns the count removed.
    ///
    /// Runs under the write lock and re-checks each record's `expires_at`
    /// before deleting, so a record refreshed after its index entry was
    /// written is never swept early.
    pub fn cleanup_expired(&self) -> Result<u64> {
        let _guard = self.write_lock.lock();
        let now = self.clock.now();
        let now_micros = now.timestamp_micros();

        let cf_records = self.cf_handle(CF_RECORDS)?;
        let cf_expiry = self.cf_handle(CF_EXPIRY)?;

        let mut batch = WriteBatch::default();
        let mut deleted = 0u64;

        for item in self.db.iterator_cf(cf_expiry, IteratorMode::Start) {
            let (index_key, _) = item?;
            if index_key.len() < EXPIRY_PREFIX_LEN {
                batch.delete_cf(cf_expiry, &index_key);
                continue;
            }

            let mut prefix = [0u8; EXPIRY_PREFIX_LEN];
            prefix.copy_from_slice(&index_key[..EXPIRY_PREFIX_LEN]);
            if i64::from_be_bytes(prefix) > now_micros {
                break;
            }

            let record_key = &index_key[EXPIRY_PREFIX_LEN..];
            match self.db.get_cf(cf_records, record_key)? {
                Some(bytes) => {
                    let record: IdempotencyRecord = bincode::deserialize(&bytes)?;
                    if record.expires_at <= now {
                        batch.delete_cf(cf_records, record_key);
                        deleted += 1;
                    }
                    // Refreshed record: only the stale index entry goes
                }
                None => {}
            }
            batch.delete_cf(cf_expiry, &index_key);
        }

        if !batch.is_empty() {
            self.db.write(batch)?;
        }

        if deleted > 0 {
            info!(deleted, "swept expired idempotency records");
        }
        Ok(deleted)
    }
}
