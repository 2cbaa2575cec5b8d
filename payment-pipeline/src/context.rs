//! Payment request context

use idempotency_store::{content_hash, IdempotencyKey};
use rate_limiter::{PaymentMethodInfo, Subject};
use rust_decimal::Decimal;
use serde_json::Value;

/// Everything the pipeline stages need about one payment request.
///
/// The request hash is computed once at construction over the canonical
/// payload encoding; stages and the recording step all compare against the
/// same digest.
#[derive(Debug, Clone)]
pub struct PaymentContext {
    /// Idempotency key scoping this logical operation
    pub key: IdempotencyKey,
    /// Counting identity for rate limiting
    pub subject: Subject,
    /// Charge amount
    pub amount: Decimal,
    /// Payment method attributes for abuse counting
    pub payment_method: PaymentMethodInfo,
    /// Raw request payload
    pub request: Value,
    /// Content hash of the canonical payload
    pub request_hash: String,
}

impl PaymentContext {
    /// Build a context, hashing `request` canonically.
    pub fn new(
        key: IdempotencyKey,
        subject: Subject,
        amount: Decimal,
        payment_method: PaymentMethodInfo,
        request: Value,
    ) -> Self {
        let request_hash = content_hash(&request);
        Self {
            key,
            subject,
            amount,
            payment_method,
            request,
            request_hash,
        }
    }
}
