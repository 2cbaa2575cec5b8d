//! Demo: drives the payment safety core end to end.
//!
//! Charges through the pipeline (first call, duplicate retry, conflicting
//! re-use), then a webhook delivery with a flaky downstream showing dedup
//! and durable retry scheduling. Run with `RUST_LOG=info`.

use anyhow::Result;
use async_trait::async_trait;
use idempotency_store::{IdempotencyKey, IdempotencyStore, StoreConfig, StoredResponse};
use payment_pipeline::{
    status_for_error, status_for_webhook, PaymentContext, PaymentHandler, PaymentPipeline,
};
use rate_limiter::{
    PaymentMethodInfo, ProcessCounters, RateLimitConfig, RateLimiter, Subject,
};
use resilience::{
    CallError, CircuitBreakerConfig, CircuitBreakerRegistry, RetryPolicy, SystemClock,
};
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::info;
use webhook_manager::{
    WebhookDelivery, WebhookProcessor, WebhookStore, WebhookStoreConfig,
    WebhookTransactionManager,
};

#[derive(Default)]
struct DemoGateway {
    charges: AtomicU32,
}

#[async_trait]
impl PaymentHandler for DemoGateway {
    async fn execute(
        &self,
        ctx: &PaymentContext,
    ) -> std::result::Result<StoredResponse, CallError> {
        let n = self.charges.fetch_add(1, Ordering::SeqCst) + 1;
        info!(amount = %ctx.amount, charge = n, "provider charge executed");
        Ok(StoredResponse {
            status_code: 201,
            body: json!({"payment_intent_id": format!("pi_demo_{:04}", n)}).to_string(),
        })
    }
}

struct FlakyFulfillment {
    healthy: AtomicBool,
}

#[async_trait]
impl WebhookProcessor for FlakyFulfillment {
    async fn process(
        &self,
        delivery: &WebhookDelivery,
    ) -> std::result::Result<String, CallError> {
        if self.healthy.swap(true, Ordering::SeqCst) {
            Ok(json!({"fulfilled": delivery.event_id}).to_string())
        } else {
            Err(CallError::Retryable("fulfillment service timeout".to_string()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let clock = Arc::new(SystemClock);

    // Payment pipeline: rate limiting + idempotency around the gateway
    let store = Arc::new(IdempotencyStore::open(&StoreConfig::from_env(), clock.clone())?);
    let counters = Arc::new(ProcessCounters::new(clock.clone()));
    let limiter = Arc::new(RateLimiter::new(
        RateLimitConfig::from_env(),
        counters,
        clock.clone(),
    ));
    let pipeline = PaymentPipeline::new(store, limiter);
    let gateway = DemoGateway::default();

    let key = IdempotencyKey::generate("payment");
    let amount = Decimal::new(5000, 2);
    let ctx = PaymentContext::new(
        key.clone(),
        Subject::new("demo-user"),
        amount,
        PaymentMethodInfo {
            method_type: "card".to_string(),
            brand: "visa".to_string(),
            last4: "4242".to_string(),
            exp_month: 12,
            exp_year: 2027,
        },
        json!({"amount": "50.00", "currency": "usd", "customer": "demo-user"}),
    );

    let first = pipeline.execute(ctx.clone(), &gateway).await?;
    info!(response = %first.body, "charge created");

    let replay = pipeline.execute(ctx.clone(), &gateway).await?;
    info!(response = %replay.body, "client retry replayed, no second charge");

    let mut conflicting = ctx.clone();
    conflicting.request = json!({"amount": "60.00", "currency": "usd", "customer": "demo-user"});
    conflicting.request_hash = idempotency_store::content_hash(&conflicting.request);
    match pipeline.execute(conflicting, &gateway).await {
        Err(e) => info!(status = %status_for_error(&e), error = %e, "key re-use rejected"),
        Ok(_) => unreachable!("conflicting re-use must not charge"),
    }

    // Webhook path: flaky downstream, dedup on redelivery
    let webhook_store = Arc::new(WebhookStore::open(&WebhookStoreConfig::from_env())?);
    let breakers = Arc::new(CircuitBreakerRegistry::new(
        CircuitBreakerConfig::default(),
        clock.clone(),
    ));
    let manager = WebhookTransactionManager::new(
        webhook_store,
        breakers,
        RetryPolicy::default(),
        clock,
    );
    let fulfillment = FlakyFulfillment {
        healthy: AtomicBool::new(false),
    };

    let delivery = WebhookDelivery {
        source: "stripe".to_string(),
        event_id: format!("evt_demo_{}", uuid_suffix(&key)),
        event_type: "payment_intent.succeeded".to_string(),
        payload: first.body.clone(),
    };

    let outcome = manager.process_delivery(&delivery, &fulfillment).await?;
    info!(status = %status_for_webhook(&outcome), ?outcome, "webhook delivery handled");

    let redelivered = manager.process_delivery(&delivery, &fulfillment).await?;
    info!(status = %status_for_webhook(&redelivered), ?redelivered, "provider redelivery handled");

    Ok(())
}

fn uuid_suffix(key: &IdempotencyKey) -> &str {
    key.as_str().rsplit_once('_').map(|(_, s)| s).unwrap_or("0")
}
