//! Rate limit configuration
//!
//! Two built-in profiles: production caps are tight enough to catch
//! card-testing, the development profile stays out of the way of test
//! traffic. Every threshold can be overridden from the environment.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Deployment profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    /// Tight caps
    Production,
    /// Relaxed caps for test traffic
    Development,
}

/// Rate limiter thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Active profile
    pub environment: Environment,

    /// Requests per subject per minute
    pub max_requests_per_minute: i64,

    /// Requests per subject per hour
    pub max_requests_per_hour: i64,

    /// Cumulative amount per subject per hour
    pub max_amount_per_hour: Decimal,

    /// Cumulative amount per subject per day
    pub max_amount_per_day: Decimal,

    /// Attempts inside the velocity lookback that flag an anomaly
    pub velocity_max_attempts: usize,

    /// Velocity lookback (minutes)
    pub velocity_window_minutes: i64,

    /// Distinct daily uses of one payment-method fingerprint
    pub fingerprint_daily_cap: i64,
}

impl RateLimitConfig {
    /// Production profile: 10/min, 50/hr, $2,000/hr, $10,000/day,
    /// fingerprint cap 10/day.
    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            max_requests_per_minute: 10,
            max_requests_per_hour: 50,
            max_amount_per_hour: Decimal::from(2_000),
            max_amount_per_day: Decimal::from(10_000),
            velocity_max_attempts: 5,
            velocity_window_minutes: 10,
            fingerprint_daily_cap: 10,
        }
    }

    /// Development profile: 100/min, 500/hr, $50,000/hr, $100,000/day,
    /// fingerprint cap 20/day.
    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            max_requests_per_minute: 100,
            max_requests_per_hour: 500,
            max_amount_per_hour: Decimal::from(50_000),
            max_amount_per_day: Decimal::from(100_000),
            velocity_max_attempts: 5,
            velocity_window_minutes: 10,
            fingerprint_daily_cap: 20,
        }
    }

    /// Profile from `RATE_LIMIT_PROFILE`, with per-threshold overrides.
    pub fn from_env() -> Self {
        let mut config = match std::env::var("RATE_LIMIT_PROFILE").as_deref() {
            Ok("development") => Self::development(),
            _ => Self::production(),
        };

        if let Some(v) = env_i64("RATE_LIMIT_MAX_PER_MINUTE") {
            config.max_requests_per_minute = v;
        }
        if let Some(v) = env_i64("RATE_LIMIT_MAX_PER_HOUR") {
            config.max_requests_per_hour = v;
        }
        if let Some(v) = env_i64("RATE_LIMIT_MAX_AMOUNT_PER_HOUR") {
            config.max_amount_per_hour = Decimal::from(v);
        }
        if let Some(v) = env_i64("RATE_LIMIT_MAX_AMOUNT_PER_DAY") {
            config.max_amount_per_day = Decimal::from(v);
        }
        if let Some(v) = env_i64("RATE_LIMIT_FINGERPRINT_DAILY_CAP") {
            config.fingerprint_daily_cap = v;
        }

        config
    }

    /// Load from a toml file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RateLimitConfig = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("failed to parse config: {}", e)))?;
        Ok(config)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::production()
    }
}

fn env_i64(name: &str) -> Option<i64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
