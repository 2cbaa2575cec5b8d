//! Velocity tracking
//!
//! Keeps a bounded trailing window of payment attempts per subject.
//! Per-window counters miss rapid-fire card testing that stays under each
//! cap; the tracker answers "how many attempts in the last N minutes"
//! regardless of window boundaries.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One observed payment attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Attempt time
    pub timestamp: DateTime<Utc>,
    /// Attempted amount
    pub amount: Decimal,
}

/// Trailing-window attempt tracker per subject
pub struct AttemptTracker {
    lookback: Duration,
    attempts: DashMap<String, Vec<AttemptRecord>>,
}

impl AttemptTracker {
    /// Tracker with a `lookback_minutes` trailing window.
    pub fn new(lookback_minutes: i64) -> Self {
        Self {
            lookback: Duration::minutes(lookback_minutes),
            attempts: DashMap::new(),
        }
    }

    /// Record an attempt for `subject_id` at `now`.
    pub fn record(&self, subject_id: &str, amount: Decimal, now: DateTime<Utc>) {
        let mut entry = self.attempts.entry(subject_id.to_string()).or_default();
        let window_start = now - self.lookback;
        entry.retain(|attempt| attempt.timestamp >= window_start);
        entry.push(AttemptRecord {
            timestamp: now,
            amount,
        });
    }

    /// Attempts for `subject_id` inside the lookback ending at `now`.
    pub fn attempts_within(&self, subject_id: &str, now: DateTime<Utc>) -> usize {
        let window_start = now - self.lookback;
        self.attempts
            .get_mut(subject_id)
            .map(|mut entry| {
                entry.retain(|attempt| attempt.timestamp >= window_start);
                entry.len()
            })
            .unwrap_or(0)
    }

    /// Recent attempts for `subject_id`, oldest first.
    pub fn recent(&self, subject_id: &str, now: DateTime<Utc>) -> Vec<AttemptRecord> {
        let window_start = now - self.lookback;
        self.attempts
            .get(subject_id)
            .map(|entry| {
                entry
                    .iter()
                    .filter(|attempt| attempt.timestamp >= window_start)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drop all attempts for `subject_id`.
    pub fn reset(&self, subject_id: &str) {
        self.attempts.remove(subject_id);
    }

    /// Number of subjects currently tracked.
    pub fn tracked_subjects(&self) -> usize {
        self.attempts.len()
    }
}
