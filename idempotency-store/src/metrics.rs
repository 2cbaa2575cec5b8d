//! Idempotency metrics

use prometheus::{register_int_counter, IntCounter};

lazy_static::lazy_static! {
    pub static ref IDEMPOTENT_REPLAYS_TOTAL: IntCounter = register_int_counter!(
        "payment_idempotent_replays_total",
        "Duplicate requests answered from the idempotency store"
    )
    .unwrap();

    pub static ref IDEMPOTENCY_CONFLICTS_TOTAL: IntCounter = register_int_counter!(
        "payment_idempotency_conflicts_total",
        "Requests re-using a key with a different payload"
    )
    .unwrap();
}
