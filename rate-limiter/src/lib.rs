//! # Payment rate limiter
//!
//! Multi-dimensional abuse detection for payment endpoints. A single
//! [`RateLimiter::check`] runs, in order: frequency windows, cumulative
//! amount windows, velocity-anomaly detection and payment-method abuse
//! counting; the first violation short-circuits. Counters live in a shared
//! store (Redis) so limits hold across workers, with an explicit
//! process-local fallback for degraded operation.
//!
//! Violations are data, not exceptions: callers receive
//! [`Decision::Denied`] with the violation kind and a remediation message
//! and must handle every case.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod config;
pub mod counters;
pub mod error;
pub mod fingerprint;
pub mod ip;
pub mod limiter;
pub mod metrics;
pub mod types;
pub mod velocity;

pub use config::{Environment, RateLimitConfig};
pub use counters::{CounterBackend, FallbackCounters, ProcessCounters, RedisCounters};
pub use error::{Error, Result};
pub use fingerprint::fingerprint;
pub use ip::client_ip;
pub use limiter::RateLimiter;
pub use types::{Decision, PaymentMethodInfo, PaymentOutcome, Subject, ViolationKind};
pub use velocity::{AttemptRecord, AttemptTracker};
