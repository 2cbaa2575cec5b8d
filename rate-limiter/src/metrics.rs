//! Rate limiter metrics

use prometheus::{
    register_counter_vec, register_int_counter, register_int_gauge_vec, CounterVec, IntCounter,
    IntGaugeVec,
};

lazy_static::lazy_static! {
    pub static ref RATE_LIMIT_CHECKS_TOTAL: CounterVec = register_counter_vec!(
        "payment_rate_limit_checks_total",
        "Rate limit checks by outcome",
        &["outcome"]
    )
    .unwrap();

    pub static ref RATE_LIMIT_VIOLATIONS_TOTAL: CounterVec = register_counter_vec!(
        "payment_rate_limit_violations_total",
        "Rate limit violations by kind",
        &["kind"]
    )
    .unwrap();

    pub static ref COUNTER_BACKEND_ACTIVE: IntGaugeVec = register_int_gauge_vec!(
        "payment_counter_backend_active",
        "Active counter backend (1 = serving requests)",
        &["backend"]
    )
    .unwrap();

    pub static ref COUNTER_BACKEND_FALLBACKS_TOTAL: IntCounter = register_int_counter!(
        "payment_counter_backend_fallbacks_total",
        "Calls served by the process-local fallback because the shared store errored"
    )
    .unwrap();
}
