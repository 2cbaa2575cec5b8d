//! # Payment pipeline
//!
//! The interceptor chain every mutating payment call passes through before
//! touching business logic, composed once at startup:
//!
//! ```text
//! request ──▶ RateLimitStage ──▶ IdempotencyStage ──▶ handler ──▶ record
//!                  │ 429                │ replay / 409
//! ```
//!
//! Stages share one uniform contract: take the context, hand back either
//! the (possibly enriched) context or a short-circuit response. The
//! pipeline owns the post-handler bookkeeping — binding the idempotency
//! key to the response and feeding the outcome back to the rate limiter —
//! so handlers stay pure business logic.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod context;
pub mod error;
pub mod pipeline;
pub mod stages;
pub mod status;

pub use context::PaymentContext;
pub use error::{Error, Result};
pub use pipeline::{PaymentHandler, PaymentPipeline};
pub use stages::{IdempotencyStage, RateLimitStage, Stage, StageOutcome};
pub use status::{status_for_error, status_for_replay, status_for_webhook};
