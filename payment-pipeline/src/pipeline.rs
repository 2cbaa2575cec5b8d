//! Pipeline composition and execution

use crate::context::PaymentContext;
use crate::error::{Error, Result};
use crate::stages::{IdempotencyStage, RateLimitStage, Stage, StageOutcome};
use async_trait::async_trait;
use idempotency_store::{IdempotencyStore, StoredResponse, DEFAULT_TTL_SECS};
use rate_limiter::{PaymentOutcome, RateLimiter};
use resilience::CallError;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Business logic for one payment operation.
///
/// Handlers stay free of safety concerns: by the time `execute` runs, the
/// request has cleared rate limiting and is known not to be a duplicate.
/// Failures are classified the same way provider calls are.
#[async_trait]
pub trait PaymentHandler: Send + Sync {
    /// Execute the operation, returning the response to cache and replay.
    async fn execute(&self, ctx: &PaymentContext)
        -> std::result::Result<StoredResponse, CallError>;
}

/// The composed interceptor chain
pub struct PaymentPipeline {
    stages: Vec<Arc<dyn Stage>>,
    store: Arc<IdempotencyStore>,
    limiter: Arc<RateLimiter>,
    response_ttl: Duration,
}

impl PaymentPipeline {
    /// Compose the standard chain: rate limiting, then idempotency.
    pub fn new(store: Arc<IdempotencyStore>, limiter: Arc<RateLimiter>) -> Self {
        let stages: Vec<Arc<dyn Stage>> = vec![
            Arc::new(RateLimitStage::new(limiter.clone())),
            Arc::new(IdempotencyStage::new(store.clone())),
        ];
        Self {
            stages,
            store,
            limiter,
            response_ttl: Duration::from_secs(DEFAULT_TTL_SECS),
        }
    }

    /// Override how long recorded responses replay before expiring.
    pub fn with_response_ttl(mut self, ttl: Duration) -> Self {
        self.response_ttl = ttl;
        self
    }

    /// Run `ctx` through every stage, then the handler, then record the
    /// outcome.
    ///
    /// A short-circuiting stage answers the client directly (replayed
    /// duplicate). After a successful handler run the response is bound to
    /// the idempotency key before it is returned; losing that race to a
    /// concurrent writer with a different payload is a conflict.
    pub async fn execute(
        &self,
        ctx: PaymentContext,
        handler: &dyn PaymentHandler,
    ) -> Result<StoredResponse> {
        let mut ctx = ctx;
        for stage in &self.stages {
            debug!(stage = stage.name(), key = %ctx.key, "applying stage");
            match stage.apply(ctx).await? {
                StageOutcome::Continue(next) => ctx = next,
                StageOutcome::ShortCircuit(response) => return Ok(response),
            }
        }

        match handler.execute(&ctx).await {
            Ok(response) => {
                match self.store.set(
                    &ctx.key,
                    &ctx.subject.user_id,
                    &ctx.request_hash,
                    &response,
                    self.response_ttl,
                ) {
                    Ok(_) => {}
                    Err(idempotency_store::Error::Conflict { key }) => {
                        return Err(Error::Conflict { key });
                    }
                    Err(e) => return Err(e.into()),
                }

                self.limiter
                    .record_result(&ctx.subject, PaymentOutcome::Succeeded, None)
                    .await?;
                Ok(response)
            }
            Err(err) => {
                self.limiter
                    .record_result(&ctx.subject, PaymentOutcome::Failed, Some(&err.to_string()))
                    .await?;
                Err(Error::Handler(err.to_string()))
            }
        }
    }
}
