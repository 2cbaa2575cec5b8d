//! Durable retry scheduler
//!
//! Polls the retry schedule and re-enters due events through the
//! transaction manager, so a failed webhook keeps making progress across
//! process restarts without any provider involvement.

use crate::{
    error::Result,
    manager::{WebhookProcessor, WebhookTransactionManager},
    store::WebhookStore,
    types::{WebhookDelivery, WebhookStatus},
};
use resilience::Clock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Default scheduler poll interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Replays due retry bookings
pub struct RetryScheduler {
    store: Arc<WebhookStore>,
    manager: Arc<WebhookTransactionManager>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
}

impl RetryScheduler {
    /// Build a scheduler over the manager's store.
    pub fn new(
        manager: Arc<WebhookTransactionManager>,
        clock: Arc<dyn Clock>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store: manager.store(),
            manager,
            clock,
            poll_interval,
        }
    }

    /// Replay every booking whose `retry_at` has passed; returns how many
    /// events were re-entered.
    pub async fn process_due(&self, processor: &dyn WebhookProcessor) -> Result<usize> {
        let now = self.clock.now();
        let due = self.store.due_retries(now)?;

        let mut replayed = 0;
        for schedule in due {
            // Consume the booking first so a crash mid-replay re-books via
            // the manager instead of double-consuming
            self.store.remove_schedule(&schedule)?;

            let Some(event) = self.store.get(&schedule.source, &schedule.event_id)? else {
                warn!(
                    source = %schedule.source,
                    event_id = %schedule.event_id,
                    "retry booking points at a missing event, dropping"
                );
                continue;
            };
            if event.status == WebhookStatus::Processed {
                continue;
            }

            let delivery = WebhookDelivery {
                source: event.source.clone(),
                event_id: event.event_id.clone(),
                event_type: event.event_type.clone(),
                payload: event.payload.clone(),
            };
            self.manager.process_delivery(&delivery, processor).await?;
            replayed += 1;
        }

        if replayed > 0 {
            info!(replayed, "webhook retries replayed");
        }
        Ok(replayed)
    }

    /// Poll loop; runs until the task is dropped.
    pub async fn run(&self, processor: &dyn WebhookProcessor) {
        info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            "webhook retry scheduler started"
        );
        loop {
            tokio::time::sleep(self.poll_interval).await;
            if let Err(e) = self.process_due(processor).await {
                error!(error = %e, "retry pass failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::WebhookStoreConfig;
    use crate::types::WebhookOutcome;
    use async_trait::async_trait;
    use resilience::{
        BackoffStrategy, CallError, CircuitBreakerConfig, CircuitBreakerRegistry, ManualClock,
        RetryPolicy,
    };
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use tempfile::TempDir;

    /// Fails while `healthy` is false, succeeds after.
    struct RecoveringProcessor {
        healthy: AtomicBool,
        calls: AtomicU32,
    }

    #[async_trait]
    impl WebhookProcessor for RecoveringProcessor {
        async fn process(
            &self,
            delivery: &WebhookDelivery,
        ) -> std::result::Result<String, CallError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.healthy.load(Ordering::SeqCst) {
                Ok(format!(r#"{{"handled":"{}"}}"#, delivery.event_id))
            } else {
                Err(CallError::Retryable("connection refused".to_string()))
            }
        }
    }

    fn setup() -> (
        Arc<WebhookTransactionManager>,
        RetryScheduler,
        Arc<ManualClock>,
        TempDir,
    ) {
        let temp_dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::starting_now());
        let store = Arc::new(
            WebhookStore::open(&WebhookStoreConfig {
                data_dir: temp_dir.path().to_path_buf(),
            })
            .unwrap(),
        );
        let breakers = Arc::new(CircuitBreakerRegistry::new(
            CircuitBreakerConfig::default(),
            clock.clone(),
        ));
        let policy = RetryPolicy {
            max_attempts: 1,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            strategy: BackoffStrategy::Fixed,
        };
        let manager = Arc::new(WebhookTransactionManager::new(
            store,
            breakers,
            policy,
            clock.clone(),
        ));
        let scheduler = RetryScheduler::new(manager.clone(), clock.clone(), DEFAULT_POLL_INTERVAL);
        (manager, scheduler, clock, temp_dir)
    }

    fn delivery(event_id: &str) -> WebhookDelivery {
        WebhookDelivery {
            source: "stripe".to_string(),
            event_id: event_id.to_string(),
            event_type: "charge.refunded".to_string(),
            payload: r#"{"amount":1200}"#.to_string(),
        }
    }

    #[tokio::test]
    async fn test_due_retry_replays_to_success() {
        let (manager, scheduler, clock, _temp) = setup();
        let processor = RecoveringProcessor {
            healthy: AtomicBool::new(false),
            calls: AtomicU32::new(0),
        };

        let outcome = manager
            .process_delivery(&delivery("evt_1"), &processor)
            .await
            .unwrap();
        assert!(matches!(outcome, WebhookOutcome::RetryScheduled { .. }));

        // Not due yet
        assert_eq!(scheduler.process_due(&processor).await.unwrap(), 0);

        // Downstream recovers; first escalation slot elapses
        processor.healthy.store(true, Ordering::SeqCst);
        clock.advance(chrono::Duration::seconds(61));
        assert_eq!(scheduler.process_due(&processor).await.unwrap(), 1);

        let event = manager.store().get("stripe", "evt_1").unwrap().unwrap();
        assert_eq!(event.status, WebhookStatus::Processed);
        assert_eq!(event.retry_count, 1);

        // Booking consumed, nothing left to replay
        clock.advance(chrono::Duration::hours(3));
        assert_eq!(scheduler.process_due(&processor).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_still_failing_event_is_rebooked() {
        let (manager, scheduler, clock, _temp) = setup();
        let processor = RecoveringProcessor {
            healthy: AtomicBool::new(false),
            calls: AtomicU32::new(0),
        };

        manager
            .process_delivery(&delivery("evt_1"), &processor)
            .await
            .unwrap();

        clock.advance(chrono::Duration::seconds(61));
        assert_eq!(scheduler.process_due(&processor).await.unwrap(), 1);

        // Replay failed again: the manager booked the next escalation slot
        let event = manager.store().get("stripe", "evt_1").unwrap().unwrap();
        assert_eq!(event.status, WebhookStatus::Failed);
        assert_eq!(event.retry_count, 1);

        let due = manager
            .store()
            .due_retries(clock.now() + chrono::Duration::seconds(301))
            .unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].attempt_number, 2);
    }
}
