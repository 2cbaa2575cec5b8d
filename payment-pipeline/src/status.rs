//! HTTP outcome mapping
//!
//! The routing layer is out of scope, but the status-code contract is
//! ours: replays carry the original status, conflicts are 409, violations
//! 429, and webhook endpoints always answer the provider 2xx promptly —
//! retries are internal.

use crate::error::Error;
use http::StatusCode;
use idempotency_store::StoredResponse;
use webhook_manager::WebhookOutcome;

/// Status code for a pipeline error.
pub fn status_for_error(error: &Error) -> StatusCode {
    match error {
        Error::Conflict { .. } => StatusCode::CONFLICT,
        Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        Error::Handler(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::Idempotency(idempotency_store::Error::Conflict { .. }) => StatusCode::CONFLICT,
        Error::Idempotency(_) | Error::RateLimiter(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Status code for a replayed response: the original one.
pub fn status_for_replay(response: &StoredResponse) -> StatusCode {
    StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::OK)
}

/// Status code answered to the webhook provider.
pub fn status_for_webhook(outcome: &WebhookOutcome) -> StatusCode {
    match outcome {
        WebhookOutcome::Processed { .. }
        | WebhookOutcome::AlreadyProcessed { .. }
        | WebhookOutcome::GaveUp { .. } => StatusCode::OK,
        WebhookOutcome::RetryScheduled { .. } => StatusCode::ACCEPTED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rate_limiter::ViolationKind;

    #[test]
    fn test_error_mapping() {
        let conflict = Error::Conflict {
            key: "payment_123".to_string(),
        };
        assert_eq!(status_for_error(&conflict), StatusCode::CONFLICT);

        let limited = Error::RateLimited {
            kind: ViolationKind::FrequencyExceeded,
            message: "10 requests per minute reached".to_string(),
        };
        assert_eq!(status_for_error(&limited), StatusCode::TOO_MANY_REQUESTS);

        let business = Error::Handler("card declined".to_string());
        assert_eq!(status_for_error(&business), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_replay_keeps_original_status() {
        let created = StoredResponse {
            status_code: 201,
            body: String::new(),
        };
        assert_eq!(status_for_replay(&created), StatusCode::CREATED);
    }

    #[test]
    fn test_webhook_always_2xx() {
        let outcomes = [
            WebhookOutcome::Processed {
                result: String::new(),
            },
            WebhookOutcome::AlreadyProcessed { result: None },
            WebhookOutcome::RetryScheduled {
                retry_at: chrono::Utc::now(),
                attempt_number: 1,
            },
            WebhookOutcome::GaveUp {
                error: String::new(),
            },
        ];
        for outcome in &outcomes {
            assert!(status_for_webhook(outcome).is_success());
        }
    }
}
