//! Durable webhook event log
//!
//! # Column families
//!
//! - `events`  - webhook events (key: `source | event_id`)
//! - `retries` - retry schedule (key: big-endian retry_at micros || event key)
//!
//! The log is the durable half of the dedup guarantee: it survives process
//! restarts and is shared by every worker, so a redelivered event reads the
//! same record wherever it lands.

use crate::{
    error::{Error, Result},
    types::{RetrySchedule, WebhookEvent},
};
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Column family names
const CF_EVENTS: &str = "events";
const CF_RETRIES: &str = "retries";

/// Width of the big-endian retry_at prefix in schedule keys
const RETRY_PREFIX_LEN: usize = 8;

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookStoreConfig {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,
}

impl Default for WebhookStoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/webhooks"),
        }
    }
}

impl WebhookStoreConfig {
    /// Load from environment variables.
    pub fn from_env() -> Self {
        let mut config = WebhookStoreConfig::default();
        if let Ok(data_dir) = std::env::var("WEBHOOK_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }
        config
    }
}

/// Durable webhook log over RocksDB
pub struct WebhookStore {
    db: Arc<DB>,
}

impl WebhookStore {
    /// Open or create the database.
    pub fn open(config: &WebhookStoreConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_EVENTS, Self::cf_options_events()),
            ColumnFamilyDescriptor::new(CF_RETRIES, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, &config.data_dir, cf_descriptors)?;

        info!(path = ?config.data_dir, "opened webhook store");

        Ok(Self { db: Arc::new(db) })
    }

    fn cf_options_events() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("column family {} not found", name)))
    }

    fn schedule_key(schedule: &RetrySchedule) -> Vec<u8> {
        let mut key = schedule.retry_at.timestamp_micros().to_be_bytes().to_vec();
        key.extend_from_slice(&WebhookEvent::storage_key(
            &schedule.source,
            &schedule.event_id,
        ));
        key
    }

    /// Look up an event by identity.
    pub fn get(&self, source: &str, event_id: &str) -> Result<Option<WebhookEvent>> {
        let cf = self.cf_handle(CF_EVENTS)?;
        let key = WebhookEvent::storage_key(source, event_id);

        match self.db.get_cf(cf, &key)? {
            None => Ok(None),
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
        }
    }

    /// Persist an event.
    pub fn put(&self, event: &WebhookEvent) -> Result<()> {
        let cf = self.cf_handle(CF_EVENTS)?;
        let key = WebhookEvent::storage_key(&event.source, &event.event_id);
        self.db.put_cf(cf, &key, bincode::serialize(event)?)?;
        Ok(())
    }

    /// Persist an event together with its retry booking, atomically.
    pub fn put_with_schedule(&self, event: &WebhookEvent, schedule: &RetrySchedule) -> Result<()> {
        let cf_events = self.cf_handle(CF_EVENTS)?;
        let cf_retries = self.cf_handle(CF_RETRIES)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(
            cf_events,
            WebhookEvent::storage_key(&event.source, &event.event_id),
            bincode::serialize(event)?,
        );
        batch.put_cf(
            cf_retries,
            Self::schedule_key(schedule),
            bincode::serialize(schedule)?,
        );
        self.db.write(batch)?;
        Ok(())
    }

    /// Schedules whose `retry_at` has passed, soonest first.
    pub fn due_retries(&self, now: DateTime<Utc>) -> Result<Vec<RetrySchedule>> {
        let cf = self.cf_handle(CF_RETRIES)?;
        let now_micros = now.timestamp_micros();

        let mut due = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item?;
            if key.len() < RETRY_PREFIX_LEN {
                continue;
            }

            let mut prefix = [0u8; RETRY_PREFIX_LEN];
            prefix.copy_from_slice(&key[..RETRY_PREFIX_LEN]);
            if i64::from_be_bytes(prefix) > now_micros {
                break;
            }

            due.push(bincode::deserialize(&value)?);
        }
        Ok(due)
    }

    /// Consume a retry booking.
    pub fn remove_schedule(&self, schedule: &RetrySchedule) -> Result<()> {
        let cf = self.cf_handle(CF_RETRIES)?;
        self.db.delete_cf(cf, Self::schedule_key(schedule))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{WebhookDelivery, WebhookStatus};
    use tempfile::TempDir;

    fn test_store() -> (WebhookStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = WebhookStoreConfig {
            data_dir: temp_dir.path().to_path_buf(),
        };
        (WebhookStore::open(&config).unwrap(), temp_dir)
    }

    fn delivery(event_id: &str) -> WebhookDelivery {
        WebhookDelivery {
            source: "stripe".to_string(),
            event_id: event_id.to_string(),
            event_type: "payment_intent.succeeded".to_string(),
            payload: r#"{"object":"event"}"#.to_string(),
        }
    }

    #[test]
    fn test_put_and_get() {
        let (store, _temp) = test_store();
        let event = WebhookEvent::new(&delivery("evt_1"), Utc::now());

        store.put(&event).unwrap();

        let loaded = store.get("stripe", "evt_1").unwrap().unwrap();
        assert_eq!(loaded.event_id, "evt_1");
        assert_eq!(loaded.status, WebhookStatus::Processing);
        assert!(store.get("stripe", "evt_2").unwrap().is_none());
        // Same id from a different source is a different identity
        assert!(store.get("square", "evt_1").unwrap().is_none());
    }

    #[test]
    fn test_due_retries_ordering_and_cutoff() {
        let (store, _temp) = test_store();
        let now = Utc::now();

        for (i, offset_secs) in [300i64, 60, 7200].iter().enumerate() {
            let event_id = format!("evt_{}", i);
            let event = WebhookEvent::new(&delivery(&event_id), now);
            let schedule = RetrySchedule {
                source: "stripe".to_string(),
                event_id,
                retry_at: now + chrono::Duration::seconds(*offset_secs),
                attempt_number: 1,
            };
            store.put_with_schedule(&event, &schedule).unwrap();
        }

        // Nothing due yet
        assert!(store.due_retries(now).unwrap().is_empty());

        // Two due after 6 minutes, soonest first
        let due = store
            .due_retries(now + chrono::Duration::seconds(360))
            .unwrap();
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].event_id, "evt_1");
        assert_eq!(due[1].event_id, "evt_0");

        // Consumed bookings disappear
        store.remove_schedule(&due[0]).unwrap();
        let due = store
            .due_retries(now + chrono::Duration::seconds(360))
            .unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].event_id, "evt_0");
    }
}
