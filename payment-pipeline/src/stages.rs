//! Pipeline stages
//!
//! Uniform contract: a stage takes the context and returns either the
//! context for the next stage or a short-circuit response. Violations and
//! conflicts are typed errors, never exceptions smuggled through the
//! happy path.

use crate::context::PaymentContext;
use crate::error::{Error, Result};
use async_trait::async_trait;
use idempotency_store::{IdempotencyStore, StoredResponse};
use rate_limiter::{Decision, RateLimiter};
use std::sync::Arc;
use tracing::info;

/// What a stage decided
#[derive(Debug)]
pub enum StageOutcome {
    /// Proceed to the next stage with this context
    Continue(PaymentContext),
    /// Answer the client from the store, skipping the handler entirely
    ShortCircuit(StoredResponse),
}

/// One element of the interceptor chain
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stage label for logs.
    fn name(&self) -> &'static str;

    /// Inspect the request; pass it on, answer it, or reject it.
    async fn apply(&self, ctx: PaymentContext) -> Result<StageOutcome>;
}

/// Rejects abusive request patterns before any money-path work happens.
pub struct RateLimitStage {
    limiter: Arc<RateLimiter>,
}

impl RateLimitStage {
    /// Stage over `limiter`.
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

#[async_trait]
impl Stage for RateLimitStage {
    fn name(&self) -> &'static str {
        "rate-limit"
    }

    async fn apply(&self, ctx: PaymentContext) -> Result<StageOutcome> {
        match self
            .limiter
            .check(&ctx.subject, ctx.amount, &ctx.payment_method)
            .await?
        {
            Decision::Allowed => Ok(StageOutcome::Continue(ctx)),
            Decision::Denied { kind, message } => Err(Error::RateLimited { kind, message }),
        }
    }
}

/// Replays cached responses for duplicate keys and rejects key re-use
/// with a different payload.
pub struct IdempotencyStage {
    store: Arc<IdempotencyStore>,
}

impl IdempotencyStage {
    /// Stage over `store`.
    pub fn new(store: Arc<IdempotencyStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Stage for IdempotencyStage {
    fn name(&self) -> &'static str {
        "idempotency"
    }

    async fn apply(&self, ctx: PaymentContext) -> Result<StageOutcome> {
        match self.store.get(&ctx.key)? {
            None => Ok(StageOutcome::Continue(ctx)),
            Some(record) => {
                if record.request_hash == ctx.request_hash {
                    info!(key = %ctx.key, "duplicate request, replaying cached response");
                    Ok(StageOutcome::ShortCircuit(record.response))
                } else {
                    Err(Error::Conflict {
                        key: ctx.key.to_string(),
                    })
                }
            }
        }
    }
}
