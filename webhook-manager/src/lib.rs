//! # Webhook transaction manager
//!
//! Safe, bounded-retry processing of asynchronous payment-provider
//! callbacks. Providers deliver at-least-once; this crate turns that into
//! at-most-once-to-success per `(source, event_id)`:
//!
//! - a processed event is never reprocessed, its stored result is replayed
//! - the business callback runs behind the per-provider circuit breaker
//!   and the in-process retry engine
//! - a retryable terminal failure lands on a durable retry schedule with a
//!   fixed escalation table, consumed by [`scheduler::RetryScheduler`]
//!
//! The HTTP endpoint answers the provider promptly whatever happens here;
//! retries are internal, never provider-visible.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod error;
pub mod manager;
pub mod metrics;
pub mod scheduler;
pub mod store;
pub mod types;

pub use error::{Error, Result};
pub use manager::{WebhookProcessor, WebhookTransactionManager};
pub use scheduler::RetryScheduler;
pub use store::{WebhookStore, WebhookStoreConfig};
pub use types::{
    RetrySchedule, WebhookDelivery, WebhookEvent, WebhookOutcome, WebhookStatus,
};

/// Durable retry escalation table (seconds): 1 min, 5 min, 15 min, 1 hr, 2 hr
pub const RETRY_ESCALATION_SECS: [u64; 5] = [60, 300, 900, 3_600, 7_200];

/// Maximum durable retries per webhook event
pub const MAX_WEBHOOK_RETRIES: u32 = 5;
