//! Bounded retry executor
//!
//! Drives an async operation under a [`RetryPolicy`]. Waits between attempts
//! are plain `tokio::time::sleep` calls with no lock held; an in-flight
//! attempt always runs to completion or its own timeout.

use crate::backoff::RetryPolicy;
use crate::error::CallError;
use crate::metrics::RETRY_SEQUENCES_TOTAL;
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Successful retry sequence
#[derive(Debug)]
pub struct RetrySuccess<T> {
    /// Value returned by the succeeding attempt
    pub value: T,
    /// Attempts consumed, including the succeeding one
    pub attempts_made: u32,
    /// Wall time across all attempts and waits
    pub duration: Duration,
}

/// Retry sequence that ended without success
#[derive(Error, Debug, Clone)]
#[error("retry gave up after {attempts_made} attempts")]
pub struct RetryFailure {
    /// Every per-attempt error message, in attempt order
    pub errors: Vec<String>,
    /// Attempts consumed
    pub attempts_made: u32,
    /// Wall time across all attempts and waits
    pub duration: Duration,
    /// True when the final error was non-retryable (stopped early)
    pub non_retryable: bool,
}

impl RetryFailure {
    /// Message of the final attempt's error.
    pub fn last_error(&self) -> &str {
        self.errors.last().map(String::as_str).unwrap_or("unknown")
    }
}

impl From<RetryFailure> for crate::error::Error {
    fn from(failure: RetryFailure) -> Self {
        crate::error::Error::RetryExhausted {
            attempts: failure.attempts_made,
            last_error: failure.last_error().to_string(),
        }
    }
}

/// Run `operation` under `policy`.
///
/// Stops immediately on success. A [`CallError::NonRetryable`] propagates on
/// first occurrence; a [`CallError::Retryable`] consumes an attempt and, if
/// budget remains, waits out the jittered backoff delay. On exhaustion the
/// failure carries every per-attempt error in order.
pub async fn execute_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
) -> std::result::Result<RetrySuccess<T>, RetryFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, CallError>>,
{
    let started = Instant::now();
    let max_attempts = policy.max_attempts.max(1);
    let mut errors = Vec::new();

    for attempt in 1..=max_attempts {
        match operation().await {
            Ok(value) => {
                debug!(attempt, "operation succeeded");
                RETRY_SEQUENCES_TOTAL.with_label_values(&["success"]).inc();
                return Ok(RetrySuccess {
                    value,
                    attempts_made: attempt,
                    duration: started.elapsed(),
                });
            }
            Err(CallError::NonRetryable(msg)) => {
                warn!(attempt, error = %msg, "non-retryable failure, giving up");
                errors.push(msg);
                RETRY_SEQUENCES_TOTAL
                    .with_label_values(&["non_retryable"])
                    .inc();
                return Err(RetryFailure {
                    errors,
                    attempts_made: attempt,
                    duration: started.elapsed(),
                    non_retryable: true,
                });
            }
            Err(CallError::Retryable(msg)) => {
                warn!(
                    attempt,
                    max_attempts,
                    error = %msg,
                    "attempt failed"
                );
                errors.push(msg);

                if attempt < max_attempts {
                    tokio::time::sleep(policy.jittered_delay(attempt)).await;
                }
            }
        }
    }

    RETRY_SEQUENCES_TOTAL.with_label_values(&["exhausted"]).inc();
    Err(RetryFailure {
        errors,
        attempts_made: max_attempts,
        duration: started.elapsed(),
        non_retryable: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::BackoffStrategy;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            strategy: BackoffStrategy::Exponential { multiplier: 2.0 },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_first_attempt() {
        let result = execute_with_retry(&fast_policy(3), || async { Ok::<_, CallError>(42) })
            .await
            .unwrap();

        assert_eq!(result.value, 42);
        assert_eq!(result.attempts_made, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result = execute_with_retry(&fast_policy(5), move || {
            let calls = calls_clone.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(CallError::Retryable(format!("flaky {}", n)))
                } else {
                    Ok("done")
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result.value, "done");
        assert_eq!(result.attempts_made, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_preserves_all_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let failure = execute_with_retry(&fast_policy(3), move || {
            let calls = calls_clone.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(CallError::Retryable(format!("error {}", n)))
            }
        })
        .await
        .unwrap_err();

        assert_eq!(failure.attempts_made, 3);
        assert!(!failure.non_retryable);
        // Errors kept in order, none discarded
        assert_eq!(failure.errors, vec!["error 0", "error 1", "error 2"]);
        assert_eq!(failure.last_error(), "error 2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_stops_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let failure = execute_with_retry(&fast_policy(5), move || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(CallError::NonRetryable("card declined".to_string()))
            }
        })
        .await
        .unwrap_err();

        assert!(failure.non_retryable);
        assert_eq!(failure.attempts_made, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
