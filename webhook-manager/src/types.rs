//! Webhook event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Processing state of a webhook event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookStatus {
    /// An attempt is in flight
    Processing,
    /// Business callback succeeded; terminal
    Processed,
    /// Last attempt failed; may re-enter Processing via the schedule
    Failed,
}

/// Inbound delivery from a payment provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookDelivery {
    /// Provider key ("stripe", "square", ...)
    pub source: String,
    /// Provider-assigned event id, unique per source
    pub event_id: String,
    /// Provider event type ("payment_intent.succeeded", ...)
    pub event_type: String,
    /// Serialized provider payload
    pub payload: String,
}

/// Durable record of one `(source, event_id)` pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Provider key
    pub source: String,
    /// Provider-assigned event id
    pub event_id: String,
    /// Provider event type
    pub event_type: String,
    /// Serialized provider payload
    pub payload: String,
    /// Current state
    pub status: WebhookStatus,
    /// Durable retries consumed so far
    pub retry_count: u32,
    /// Error detail of the last failed attempt
    pub last_error: Option<String>,
    /// Serialized business-callback result, set on success
    pub result: Option<String>,
    /// First receipt time
    pub created_at: DateTime<Utc>,
    /// Success time
    pub processed_at: Option<DateTime<Utc>>,
    /// Last failure time
    pub failed_at: Option<DateTime<Utc>>,
}

impl WebhookEvent {
    /// Fresh record for a first delivery.
    pub fn new(delivery: &WebhookDelivery, now: DateTime<Utc>) -> Self {
        Self {
            source: delivery.source.clone(),
            event_id: delivery.event_id.clone(),
            event_type: delivery.event_type.clone(),
            payload: delivery.payload.clone(),
            status: WebhookStatus::Processing,
            retry_count: 0,
            last_error: None,
            result: None,
            created_at: now,
            processed_at: None,
            failed_at: None,
        }
    }

    /// Storage key: `source | event_id`.
    pub fn storage_key(source: &str, event_id: &str) -> Vec<u8> {
        let mut key = source.as_bytes().to_vec();
        key.push(b'|');
        key.extend_from_slice(event_id.as_bytes());
        key
    }
}

/// Durable retry booking for a failed event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySchedule {
    /// Provider key
    pub source: String,
    /// Provider-assigned event id
    pub event_id: String,
    /// Re-invoke processing at or after this instant
    pub retry_at: DateTime<Utc>,
    /// Which durable retry this booking represents (1-indexed)
    pub attempt_number: u32,
}

/// What happened to a delivery; every variant answers the provider 2xx.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Business callback succeeded on this delivery
    Processed {
        /// Serialized callback result
        result: String,
    },
    /// Event already processed; stored result replayed, callback not run
    AlreadyProcessed {
        /// Stored result from the original success
        result: Option<String>,
    },
    /// Attempt failed; a durable retry is booked
    RetryScheduled {
        /// When the scheduler re-invokes processing
        retry_at: DateTime<Utc>,
        /// 1-indexed durable retry number
        attempt_number: u32,
    },
    /// Attempt failed with no retry budget or a non-retryable error
    GaveUp {
        /// Error detail
        error: String,
    },
}
