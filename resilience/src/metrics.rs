//! Resilience metrics

use prometheus::{register_counter_vec, register_int_gauge_vec, CounterVec, IntGaugeVec};

lazy_static::lazy_static! {
    pub static ref CIRCUIT_STATE: IntGaugeVec = register_int_gauge_vec!(
        "payment_circuit_state",
        "Circuit breaker state per provider (0=closed, 1=half-open, 2=open)",
        &["provider"]
    )
    .unwrap();

    pub static ref RETRY_SEQUENCES_TOTAL: CounterVec = register_counter_vec!(
        "payment_retry_sequences_total",
        "Completed retry sequences by outcome",
        &["outcome"]
    )
    .unwrap();
}
