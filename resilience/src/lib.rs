//! # Resilience primitives for provider calls
//!
//! Building blocks shared by the payment endpoints and the webhook
//! processing path:
//! - Backoff/retry engine with fixed, linear and exponential strategies
//! - Circuit breaker per payment provider
//! - Injectable clock for deterministic tests
//!
//! ## Composition
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │            Retry Engine (bounded)            │
//! │  ┌────────────────────────────────────────┐  │
//! │  │      Circuit Breaker (per provider)    │  │
//! │  │  ┌──────────────────────────────────┐  │  │
//! │  │  │      Provider call (timeout)     │  │  │
//! │  │  └──────────────────────────────────┘  │  │
//! │  └────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod backoff;
pub mod circuit_breaker;
pub mod clock;
pub mod error;
pub mod metrics;
pub mod retry;

pub use backoff::{BackoffStrategy, RetryPolicy};
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CallError, Error, Result};
pub use retry::{execute_with_retry, RetryFailure, RetrySuccess};

/// Default consecutive failures before a breaker opens
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default seconds a breaker stays open before admitting a trial call
pub const DEFAULT_RECOVERY_SECONDS: u64 = 60;

/// Default attempts for an in-process retry sequence
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
