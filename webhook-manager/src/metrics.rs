//! Webhook metrics

use prometheus::{register_counter_vec, CounterVec};

lazy_static::lazy_static! {
    pub static ref WEBHOOK_EVENTS_TOTAL: CounterVec = register_counter_vec!(
        "payment_webhook_events_total",
        "Webhook deliveries by source and outcome",
        &["source", "outcome"]
    )
    .unwrap();

    pub static ref WEBHOOK_RETRIES_SCHEDULED_TOTAL: CounterVec = register_counter_vec!(
        "payment_webhook_retries_scheduled_total",
        "Durable webhook retries booked, by source",
        &["source"]
    )
    .unwrap();
}
