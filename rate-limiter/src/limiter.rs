//! Multi-dimensional payment rate limiter
//!
//! Check order: frequency windows, amount windows, velocity anomaly,
//! payment-method abuse. The first violation short-circuits and leaves
//! every counter untouched; only an allowed request advances them.

use crate::{
    config::RateLimitConfig,
    counters::CounterBackend,
    error::{Error, Result},
    fingerprint::fingerprint,
    metrics::{RATE_LIMIT_CHECKS_TOTAL, RATE_LIMIT_VIOLATIONS_TOTAL},
    types::{Decision, PaymentMethodInfo, PaymentOutcome, Subject, ViolationKind},
    velocity::AttemptTracker,
};
use chrono::{DateTime, Utc};
use resilience::Clock;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

// Counter TTLs: double the window so a key never lapses mid-window
const MINUTE_TTL: Duration = Duration::from_secs(120);
const HOUR_TTL: Duration = Duration::from_secs(7_200);
const DAY_TTL: Duration = Duration::from_secs(172_800);

/// The rate limiter service
pub struct RateLimiter {
    config: RateLimitConfig,
    counters: Arc<dyn CounterBackend>,
    attempts: AttemptTracker,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Build a limiter over `counters`.
    pub fn new(
        config: RateLimitConfig,
        counters: Arc<dyn CounterBackend>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        info!(
            backend = counters.name(),
            profile = ?config.environment,
            "rate limiter initialized"
        );
        let attempts = AttemptTracker::new(config.velocity_window_minutes);
        Self {
            config,
            counters,
            attempts,
            clock,
        }
    }

    /// Run every dimension for one payment request.
    ///
    /// Returns [`Decision::Denied`] on the first violation; an
    /// [`Decision::Allowed`] outcome has already advanced the counters and
    /// recorded the attempt for velocity tracking.
    pub async fn check(
        &self,
        subject: &Subject,
        amount: Decimal,
        method: &PaymentMethodInfo,
    ) -> Result<Decision> {
        let now = self.clock.now();
        let id = subject.id();

        // 1. Frequency
        let per_minute = self.counters.get(&minute_key(id, now)).await?;
        if per_minute >= self.config.max_requests_per_minute {
            return Ok(self.deny(
                ViolationKind::FrequencyExceeded,
                format!(
                    "{} requests per minute reached, wait for the next minute window",
                    self.config.max_requests_per_minute
                ),
            ));
        }
        let per_hour = self.counters.get(&hour_key(id, now)).await?;
        if per_hour >= self.config.max_requests_per_hour {
            return Ok(self.deny(
                ViolationKind::FrequencyExceeded,
                format!(
                    "{} requests per hour reached, wait for the next hour window",
                    self.config.max_requests_per_hour
                ),
            ));
        }

        // 2. Amount
        let cents = to_cents(amount)?;
        let hour_sum = self.counters.get(&amount_hour_key(id, now)).await?;
        if hour_sum + cents > to_cents(self.config.max_amount_per_hour)? {
            return Ok(self.deny(
                ViolationKind::AmountExceeded,
                format!(
                    "per hour limit of ${} would be exceeded",
                    self.config.max_amount_per_hour
                ),
            ));
        }
        let day_sum = self.counters.get(&amount_day_key(id, now)).await?;
        if day_sum + cents > to_cents(self.config.max_amount_per_day)? {
            return Ok(self.deny(
                ViolationKind::AmountExceeded,
                format!(
                    "per day limit of ${} would be exceeded",
                    self.config.max_amount_per_day
                ),
            ));
        }

        // 3. Velocity anomaly, independent of the window counters
        let recent = self.attempts.attempts_within(id, now);
        if recent >= self.config.velocity_max_attempts {
            return Ok(self.deny(
                ViolationKind::VelocityAnomaly,
                format!(
                    "{} payment attempts in the last {} minutes",
                    recent, self.config.velocity_window_minutes
                ),
            ));
        }

        // 4. Payment-method abuse
        let fp = fingerprint(method);
        let fp_uses = self.counters.get(&fingerprint_day_key(&fp, now)).await?;
        if fp_uses >= self.config.fingerprint_daily_cap {
            return Ok(self.deny(
                ViolationKind::PaymentMethodAbuse,
                format!(
                    "payment method used {} times today, daily cap is {}",
                    fp_uses, self.config.fingerprint_daily_cap
                ),
            ));
        }

        // All dimensions clear: advance counters and remember the attempt
        self.counters.incr_by(&minute_key(id, now), 1, MINUTE_TTL).await?;
        self.counters.incr_by(&hour_key(id, now), 1, HOUR_TTL).await?;
        self.counters
            .incr_by(&amount_hour_key(id, now), cents, HOUR_TTL)
            .await?;
        self.counters
            .incr_by(&amount_day_key(id, now), cents, DAY_TTL)
            .await?;
        self.counters
            .incr_by(&fingerprint_day_key(&fp, now), 1, DAY_TTL)
            .await?;
        self.attempts.record(id, amount, now);

        RATE_LIMIT_CHECKS_TOTAL.with_label_values(&["allowed"]).inc();
        debug!(user_id = id, %amount, "payment request allowed");
        Ok(Decision::Allowed)
    }

    /// Feed back the terminal outcome of an allowed attempt.
    ///
    /// Success clears the subject's failure streak; failure extends it. The
    /// streak feeds repeated-decline detection, separate from the
    /// per-window checks.
    pub async fn record_result(
        &self,
        subject: &Subject,
        outcome: PaymentOutcome,
        failure_reason: Option<&str>,
    ) -> Result<()> {
        match outcome {
            PaymentOutcome::Succeeded => {
                self.counters.remove(&failure_key(subject.id())).await?;
            }
            PaymentOutcome::Failed => {
                let streak = self
                    .counters
                    .incr_by(&failure_key(subject.id()), 1, DAY_TTL)
                    .await?;
                warn!(
                    user_id = subject.id(),
                    streak,
                    reason = failure_reason.unwrap_or("unspecified"),
                    "payment failure recorded"
                );
            }
        }
        Ok(())
    }

    /// Current failure streak for `subject`.
    pub async fn consecutive_failures(&self, subject: &Subject) -> Result<i64> {
        self.counters.get(&failure_key(subject.id())).await
    }

    fn deny(&self, kind: ViolationKind, message: String) -> Decision {
        RATE_LIMIT_CHECKS_TOTAL.with_label_values(&["denied"]).inc();
        RATE_LIMIT_VIOLATIONS_TOTAL
            .with_label_values(&[kind.as_str()])
            .inc();
        warn!(kind = kind.as_str(), %message, "payment rate limit violation");
        Decision::Denied { kind, message }
    }
}

fn to_cents(amount: Decimal) -> Result<i64> {
    (amount * Decimal::from(100))
        .trunc()
        .to_i64()
        .ok_or_else(|| Error::InvalidAmount(amount.to_string()))
}

// Fixed-window keys embed the window epoch, so a new window is a new key
// and lapsed windows age out via TTL.

fn minute_key(id: &str, now: DateTime<Utc>) -> String {
    format!("rl:freq:m:{}:{}", id, now.timestamp() / 60)
}

fn hour_key(id: &str, now: DateTime<Utc>) -> String {
    format!("rl:freq:h:{}:{}", id, now.timestamp() / 3_600)
}

fn amount_hour_key(id: &str, now: DateTime<Utc>) -> String {
    format!("rl:amt:h:{}:{}", id, now.timestamp() / 3_600)
}

fn amount_day_key(id: &str, now: DateTime<Utc>) -> String {
    format!("rl:amt:d:{}:{}", id, now.timestamp() / 86_400)
}

fn fingerprint_day_key(fp: &str, now: DateTime<Utc>) -> String {
    format!("rl:fp:d:{}:{}", fp, now.timestamp() / 86_400)
}

fn failure_key(id: &str) -> String {
    format!("rl:fail:{}", id)
}
