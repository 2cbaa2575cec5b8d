//! Webhook transaction manager
//!
//! Orchestrates the dedup log, the per-provider circuit breaker and the
//! retry engine around one webhook-processing unit of work.

use crate::{
    error::Result,
    metrics::{WEBHOOK_EVENTS_TOTAL, WEBHOOK_RETRIES_SCHEDULED_TOTAL},
    store::WebhookStore,
    types::{RetrySchedule, WebhookDelivery, WebhookEvent, WebhookOutcome, WebhookStatus},
    MAX_WEBHOOK_RETRIES, RETRY_ESCALATION_SECS,
};
use async_trait::async_trait;
use resilience::{
    execute_with_retry, CallError, CircuitBreakerRegistry, Clock, RetryPolicy,
};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Business callback invoked for a webhook delivery.
///
/// Implementations classify their failures: transport trouble reaching a
/// downstream system is [`CallError::Retryable`], a payload the business
/// logic rejects is [`CallError::NonRetryable`]. The callback carries its
/// own timeout; a hung call must resolve to an error on its own.
#[async_trait]
pub trait WebhookProcessor: Send + Sync {
    /// Process one delivery, returning the serialized result to cache.
    async fn process(&self, delivery: &WebhookDelivery)
        -> std::result::Result<String, CallError>;
}

/// The webhook transaction manager
pub struct WebhookTransactionManager {
    store: Arc<WebhookStore>,
    breakers: Arc<CircuitBreakerRegistry>,
    retry_policy: RetryPolicy,
    max_retries: u32,
    clock: Arc<dyn Clock>,
}

impl WebhookTransactionManager {
    /// Build a manager over `store` and `breakers`.
    pub fn new(
        store: Arc<WebhookStore>,
        breakers: Arc<CircuitBreakerRegistry>,
        retry_policy: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            breakers,
            retry_policy,
            max_retries: MAX_WEBHOOK_RETRIES,
            clock,
        }
    }

    /// Override the durable retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Run one delivery through the state machine:
    /// none → processing → processed | failed, with failed re-entering
    /// processing on a scheduled redelivery.
    pub async fn process_delivery(
        &self,
        delivery: &WebhookDelivery,
        processor: &dyn WebhookProcessor,
    ) -> Result<WebhookOutcome> {
        let now = self.clock.now();

        let mut event = match self.store.get(&delivery.source, &delivery.event_id)? {
            Some(existing) if existing.status == WebhookStatus::Processed => {
                info!(
                    source = %delivery.source,
                    event_id = %delivery.event_id,
                    "duplicate webhook delivery, replaying stored result"
                );
                WEBHOOK_EVENTS_TOTAL
                    .with_label_values(&[delivery.source.as_str(), "replayed"])
                    .inc();
                return Ok(WebhookOutcome::AlreadyProcessed {
                    result: existing.result,
                });
            }
            Some(mut existing) => {
                // Redelivery of a failed event consumes a durable retry
                if existing.status == WebhookStatus::Failed {
                    existing.retry_count += 1;
                }
                existing.status = WebhookStatus::Processing;
                existing
            }
            None => WebhookEvent::new(delivery, now),
        };
        self.store.put(&event)?;

        let outcome =
            execute_with_retry(&self.retry_policy, || self.attempt(delivery, processor)).await;

        match outcome {
            Ok(success) => {
                event.status = WebhookStatus::Processed;
                event.result = Some(success.value);
                event.processed_at = Some(self.clock.now());
                event.last_error = None;
                self.store.put(&event)?;

                info!(
                    source = %event.source,
                    event_id = %event.event_id,
                    attempts = success.attempts_made,
                    "webhook processed"
                );
                WEBHOOK_EVENTS_TOTAL
                    .with_label_values(&[event.source.as_str(), "processed"])
                    .inc();
                Ok(WebhookOutcome::Processed {
                    result: event.result.clone().unwrap_or_default(),
                })
            }
            Err(failure) => {
                let error_detail = failure.errors.join("; ");
                let failed_at = self.clock.now();
                event.status = WebhookStatus::Failed;
                event.last_error = Some(error_detail.clone());
                event.failed_at = Some(failed_at);

                if !failure.non_retryable && event.retry_count < self.max_retries {
                    let slot = (event.retry_count as usize).min(RETRY_ESCALATION_SECS.len() - 1);
                    let retry_at = failed_at
                        + chrono::Duration::seconds(RETRY_ESCALATION_SECS[slot] as i64);
                    let schedule = RetrySchedule {
                        source: event.source.clone(),
                        event_id: event.event_id.clone(),
                        retry_at,
                        attempt_number: event.retry_count + 1,
                    };
                    self.store.put_with_schedule(&event, &schedule)?;

                    warn!(
                        source = %event.source,
                        event_id = %event.event_id,
                        retry_at = %retry_at,
                        attempt_number = schedule.attempt_number,
                        error = %error_detail,
                        "webhook failed, durable retry scheduled"
                    );
                    WEBHOOK_RETRIES_SCHEDULED_TOTAL
                        .with_label_values(&[event.source.as_str()])
                        .inc();
                    Ok(WebhookOutcome::RetryScheduled {
                        retry_at,
                        attempt_number: schedule.attempt_number,
                    })
                } else {
                    self.store.put(&event)?;

                    error!(
                        source = %event.source,
                        event_id = %event.event_id,
                        retry_count = event.retry_count,
                        non_retryable = failure.non_retryable,
                        error = %error_detail,
                        "webhook failed terminally"
                    );
                    WEBHOOK_EVENTS_TOTAL
                        .with_label_values(&[event.source.as_str(), "gave_up"])
                        .inc();
                    Ok(WebhookOutcome::GaveUp {
                        error: error_detail,
                    })
                }
            }
        }
    }

    /// Durable log handle, shared with the scheduler.
    pub fn store(&self) -> Arc<WebhookStore> {
        self.store.clone()
    }

    /// One attempt: circuit breaker, then the callback, then accounting.
    /// A breaker rejection never reaches the provider and never feeds the
    /// failure counter; it surfaces as a retryable error so the sequence
    /// can outwait the cool-down.
    async fn attempt(
        &self,
        delivery: &WebhookDelivery,
        processor: &dyn WebhookProcessor,
    ) -> std::result::Result<String, CallError> {
        if let Err(rejection) = self.breakers.acquire(&delivery.source).await {
            return Err(CallError::Retryable(rejection.to_string()));
        }

        match processor.process(delivery).await {
            Ok(result) => {
                self.breakers.record_success(&delivery.source).await;
                Ok(result)
            }
            Err(err) => {
                if err.is_retryable() {
                    self.breakers.record_failure(&delivery.source).await;
                }
                Err(err)
            }
        }
    }
}
