//! End-to-end payment pipeline tests
//!
//! Drives a fake payment gateway through the full chain: rate limiting,
//! idempotent replay, conflict rejection, and failure-streak feedback.

use async_trait::async_trait;
use http::StatusCode;
use idempotency_store::{IdempotencyKey, IdempotencyStore, StoreConfig, StoredResponse};
use payment_pipeline::{
    status_for_error, status_for_replay, Error, PaymentContext, PaymentHandler, PaymentPipeline,
};
use rate_limiter::{
    PaymentMethodInfo, ProcessCounters, RateLimitConfig, RateLimiter, Subject,
};
use resilience::{CallError, ManualClock};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Fake gateway: every successful call mints a new payment intent.
struct FakeGateway {
    charges: AtomicU32,
    decline: bool,
}

impl FakeGateway {
    fn new() -> Self {
        Self {
            charges: AtomicU32::new(0),
            decline: false,
        }
    }

    fn declining() -> Self {
        Self {
            charges: AtomicU32::new(0),
            decline: true,
        }
    }

    fn charges(&self) -> u32 {
        self.charges.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentHandler for FakeGateway {
    async fn execute(
        &self,
        _ctx: &PaymentContext,
    ) -> std::result::Result<StoredResponse, CallError> {
        if self.decline {
            return Err(CallError::NonRetryable("card_declined".to_string()));
        }
        let n = self.charges.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(StoredResponse {
            status_code: 201,
            body: json!({"payment_intent_id": format!("pi_{:04}", n)}).to_string(),
        })
    }
}

struct TestRig {
    pipeline: PaymentPipeline,
    limiter: Arc<RateLimiter>,
    clock: Arc<ManualClock>,
    _temp: TempDir,
}

fn rig_with(config: RateLimitConfig) -> TestRig {
    let temp = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::starting_now());
    let store = Arc::new(
        IdempotencyStore::open(
            &StoreConfig {
                data_dir: temp.path().to_path_buf(),
            },
            clock.clone(),
        )
        .unwrap(),
    );
    let counters = Arc::new(ProcessCounters::new(clock.clone()));
    let limiter = Arc::new(RateLimiter::new(config, counters, clock.clone()));
    let pipeline = PaymentPipeline::new(store, limiter.clone());
    TestRig {
        pipeline,
        limiter,
        clock,
        _temp: temp,
    }
}

fn rig() -> TestRig {
    rig_with(RateLimitConfig::development())
}

fn visa() -> PaymentMethodInfo {
    PaymentMethodInfo {
        method_type: "card".to_string(),
        brand: "visa".to_string(),
        last4: "4242".to_string(),
        exp_month: 12,
        exp_year: 2027,
    }
}

fn charge_ctx(key: &IdempotencyKey, amount: Decimal) -> PaymentContext {
    PaymentContext::new(
        key.clone(),
        Subject::new("user-1"),
        amount,
        visa(),
        json!({"amount": amount.to_string(), "currency": "usd", "customer": "user-1"}),
    )
}

#[tokio::test]
async fn test_client_retry_replays_same_intent_without_second_charge() {
    let rig = rig();
    let gateway = FakeGateway::new();
    let key = IdempotencyKey::generate("payment");

    let first = rig
        .pipeline
        .execute(charge_ctx(&key, dec!(50.00)), &gateway)
        .await
        .unwrap();
    assert!(first.body.contains("pi_0001"));
    assert_eq!(gateway.charges(), 1);

    // Network-level duplicate: identical key and payload
    let replay = rig
        .pipeline
        .execute(charge_ctx(&key, dec!(50.00)), &gateway)
        .await
        .unwrap();

    // Identical intent, original status, no new charge
    assert_eq!(replay.body, first.body);
    assert_eq!(status_for_replay(&replay), StatusCode::CREATED);
    assert_eq!(gateway.charges(), 1);
}

#[tokio::test]
async fn test_key_reuse_with_new_amount_is_conflict_not_charge() {
    let rig = rig();
    let gateway = FakeGateway::new();
    let key = IdempotencyKey::generate("payment");

    rig.pipeline
        .execute(charge_ctx(&key, dec!(50.00)), &gateway)
        .await
        .unwrap();

    // Same key, different amount: conflict, never a second charge
    let err = rig
        .pipeline
        .execute(charge_ctx(&key, dec!(60.00)), &gateway)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Conflict { .. }));
    assert_eq!(status_for_error(&err), StatusCode::CONFLICT);
    assert_eq!(gateway.charges(), 1);
}

#[tokio::test]
async fn test_frequency_violation_maps_to_429() {
    let mut config = RateLimitConfig::development();
    config.max_requests_per_minute = 1;
    let rig = rig_with(config);
    let gateway = FakeGateway::new();

    rig.pipeline
        .execute(
            charge_ctx(&IdempotencyKey::generate("payment"), dec!(10.00)),
            &gateway,
        )
        .await
        .unwrap();

    let err = rig
        .pipeline
        .execute(
            charge_ctx(&IdempotencyKey::generate("payment"), dec!(10.00)),
            &gateway,
        )
        .await
        .unwrap_err();

    match &err {
        Error::RateLimited { message, .. } => assert!(message.contains("per minute")),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(status_for_error(&err), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(gateway.charges(), 1);
}

#[tokio::test]
async fn test_replay_does_not_consume_rate_budget_for_handler() {
    let rig = rig();
    let gateway = FakeGateway::new();
    let key = IdempotencyKey::generate("payment");

    for _ in 0..3 {
        rig.pipeline
            .execute(charge_ctx(&key, dec!(25.00)), &gateway)
            .await
            .unwrap();
    }
    // However often the client retries, the gateway saw one charge
    assert_eq!(gateway.charges(), 1);
}

#[tokio::test]
async fn test_decline_feeds_failure_streak_and_maps_cleanly() {
    let rig = rig();
    let gateway = FakeGateway::declining();
    let subject = Subject::new("user-1");

    let err = rig
        .pipeline
        .execute(
            charge_ctx(&IdempotencyKey::generate("payment"), dec!(10.00)),
            &gateway,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Handler(_)));
    // A classified business failure, not an ambiguous 500
    assert_ne!(
        status_for_error(&err),
        StatusCode::INTERNAL_SERVER_ERROR
    );
    assert_eq!(rig.limiter.consecutive_failures(&subject).await.unwrap(), 1);

    // A later success clears the streak
    let ok_gateway = FakeGateway::new();
    rig.pipeline
        .execute(
            charge_ctx(&IdempotencyKey::generate("payment"), dec!(10.00)),
            &ok_gateway,
        )
        .await
        .unwrap();
    assert_eq!(rig.limiter.consecutive_failures(&subject).await.unwrap(), 0);
}

#[tokio::test]
async fn test_replay_stops_at_expiry() {
    let rig = rig();
    let gateway = FakeGateway::new();
    let key = IdempotencyKey::generate("payment");

    rig.pipeline
        .execute(charge_ctx(&key, dec!(50.00)), &gateway)
        .await
        .unwrap();

    // Past the response TTL the key no longer replays; the handler runs
    // again and mints a fresh intent
    rig.clock.advance(chrono::Duration::seconds(86_401));
    let second = rig
        .pipeline
        .execute(charge_ctx(&key, dec!(50.00)), &gateway)
        .await
        .unwrap();

    assert!(second.body.contains("pi_0002"));
    assert_eq!(gateway.charges(), 2);
}
