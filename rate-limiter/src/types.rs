//! Core types for the rate limiter

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Counting identity for a payment request.
///
/// Frequency, amount and velocity dimensions key off the user; the
/// payment-method dimension keys off the fingerprint derived from
/// [`PaymentMethodInfo`] at check time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Authenticated user
    pub user_id: String,
    /// Client address, when the transport layer resolved one
    pub client_ip: Option<IpAddr>,
}

impl Subject {
    /// Subject for `user_id` with no resolved address.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            client_ip: None,
        }
    }

    /// Attach the resolved client address.
    pub fn with_ip(mut self, ip: IpAddr) -> Self {
        self.client_ip = Some(ip);
        self
    }

    /// Key used for this subject's counters.
    pub fn id(&self) -> &str {
        &self.user_id
    }
}

/// Violation classes, surfaced to clients as 429 bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationKind {
    /// Too many requests in a frequency window
    FrequencyExceeded,
    /// Cumulative amount cap breached
    AmountExceeded,
    /// Burst of attempts inside the velocity lookback
    VelocityAnomaly,
    /// One payment method used too many times in a day
    PaymentMethodAbuse,
}

impl ViolationKind {
    /// Stable wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::FrequencyExceeded => "FREQUENCY_EXCEEDED",
            ViolationKind::AmountExceeded => "AMOUNT_EXCEEDED",
            ViolationKind::VelocityAnomaly => "VELOCITY_ANOMALY",
            ViolationKind::PaymentMethodAbuse => "PAYMENT_METHOD_ABUSE",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check outcome; every caller must handle both arms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    /// Request may proceed; counters have been advanced
    Allowed,
    /// Request rejected; counters untouched
    Denied {
        /// Violation class
        kind: ViolationKind,
        /// Human-readable reason naming the breached window
        message: String,
    },
}

impl Decision {
    /// Whether the request may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

/// Non-sensitive payment-method attributes used for fingerprinting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethodInfo {
    /// Method kind ("card", "bank_account", ...)
    pub method_type: String,
    /// Card network or bank brand
    pub brand: String,
    /// Last four digits
    pub last4: String,
    /// Expiry month
    pub exp_month: u8,
    /// Expiry year
    pub exp_year: u16,
}

/// Terminal result of a payment attempt, fed back via
/// [`crate::RateLimiter::record_result`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// Provider accepted the payment
    Succeeded,
    /// Provider declined or the call failed
    Failed,
}
