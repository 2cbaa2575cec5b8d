//! Counter backends
//!
//! Counters are plain integers per window key (counts and minor-unit
//! amount sums share one shape). The shared backend keeps limits correct
//! across workers; the process-local backend is only correct for a
//! single-process deployment and exists as an explicit, observable
//! degraded mode — never a silent substitute.

use crate::error::Result;
use crate::metrics::{COUNTER_BACKEND_ACTIVE, COUNTER_BACKEND_FALLBACKS_TOTAL};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use redis::{aio::ConnectionManager, AsyncCommands};
use resilience::Clock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Windowed integer counters keyed by string.
#[async_trait]
pub trait CounterBackend: Send + Sync {
    /// Current value for `key` (0 when absent or lapsed).
    async fn get(&self, key: &str) -> Result<i64>;

    /// Add `delta` to `key`, arming `ttl` on first touch; returns the new
    /// value.
    async fn incr_by(&self, key: &str, delta: i64, ttl: Duration) -> Result<i64>;

    /// Drop `key`.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Backend label for logs and metrics.
    fn name(&self) -> &'static str;
}

/// Shared counters over Redis.
pub struct RedisCounters {
    conn: ConnectionManager,
}

impl RedisCounters {
    /// Connect to the shared store.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        info!(backend = "redis", "rate-limit counter store connected");
        COUNTER_BACKEND_ACTIVE.with_label_values(&["redis"]).set(1);
        Ok(Self { conn })
    }
}

#[async_trait]
impl CounterBackend for RedisCounters {
    async fn get(&self, key: &str) -> Result<i64> {
        let mut con = self.conn.clone();
        let value: Option<i64> = con.get(key).await?;
        Ok(value.unwrap_or(0))
    }

    async fn incr_by(&self, key: &str, delta: i64, ttl: Duration) -> Result<i64> {
        let mut con = self.conn.clone();
        let value: i64 = con.incr(key, delta).await?;
        if value == delta {
            // First touch of this window key
            let _: () = con.expire(key, ttl.as_secs() as i64).await?;
        }
        Ok(value)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut con = self.conn.clone();
        let _: () = con.del(key).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

#[derive(Debug, Clone)]
struct WindowEntry {
    value: i64,
    expires_at: DateTime<Utc>,
}

/// Process-local counters.
///
/// Correct only for a single-process deployment: each worker counts its
/// own traffic, so caps are effectively multiplied by the worker count.
pub struct ProcessCounters {
    entries: DashMap<String, WindowEntry>,
    clock: Arc<dyn Clock>,
}

impl ProcessCounters {
    /// Create an empty counter map.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        COUNTER_BACKEND_ACTIVE
            .with_label_values(&["process-local"])
            .set(1);
        Self {
            entries: DashMap::new(),
            clock,
        }
    }
}

#[async_trait]
impl CounterBackend for ProcessCounters {
    async fn get(&self, key: &str) -> Result<i64> {
        let now = self.clock.now();
        Ok(self
            .entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value)
            .unwrap_or(0))
    }

    async fn incr_by(&self, key: &str, delta: i64, ttl: Duration) -> Result<i64> {
        let now = self.clock.now();
        let expires_at = now
            + chrono::Duration::from_std(ttl)
                .map_err(|e| crate::error::Error::Counter(format!("ttl out of range: {e}")))?;

        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| WindowEntry {
                value: 0,
                expires_at,
            });

        if entry.expires_at <= now {
            // Window lapsed, start a fresh one
            entry.value = 0;
            entry.expires_at = expires_at;
        }
        entry.value += delta;
        Ok(entry.value)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "process-local"
    }
}

/// Shared backend with a per-call process-local fallback.
///
/// Every fall-through is logged and counted; operators can tell from the
/// metric alone that limits are running in single-process mode.
pub struct FallbackCounters {
    shared: Arc<dyn CounterBackend>,
    local: ProcessCounters,
}

impl FallbackCounters {
    /// Wrap `shared` with a local fallback.
    pub fn new(shared: Arc<dyn CounterBackend>, clock: Arc<dyn Clock>) -> Self {
        Self {
            shared,
            local: ProcessCounters::new(clock),
        }
    }

    fn note_fallback(&self, op: &str, error: &crate::error::Error) {
        COUNTER_BACKEND_FALLBACKS_TOTAL.inc();
        warn!(
            op,
            error = %error,
            "shared counter store unavailable, serving from process-local counters"
        );
    }
}

#[async_trait]
impl CounterBackend for FallbackCounters {
    async fn get(&self, key: &str) -> Result<i64> {
        match self.shared.get(key).await {
            Ok(value) => Ok(value),
            Err(e) => {
                self.note_fallback("get", &e);
                self.local.get(key).await
            }
        }
    }

    async fn incr_by(&self, key: &str, delta: i64, ttl: Duration) -> Result<i64> {
        match self.shared.incr_by(key, delta, ttl).await {
            Ok(value) => Ok(value),
            Err(e) => {
                self.note_fallback("incr_by", &e);
                self.local.incr_by(key, delta, ttl).await
            }
        }
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match self.shared.remove(key).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.note_fallback("remove", &e);
                self.local.remove(key).await
            }
        }
    }

    fn name(&self) -> &'static str {
        "shared-with-fallback"
    }
}
