//! Payment-method fingerprinting
//!
//! Abuse counting needs a stable identifier per physical payment method
//! without holding raw payment data. The fingerprint is a truncated
//! SHA-256 over non-sensitive attributes: enough entropy to separate
//! methods, nothing reversible.

use crate::types::PaymentMethodInfo;
use sha2::{Digest, Sha256};

/// Hex width of a fingerprint (8 bytes of digest)
pub const FINGERPRINT_LEN: usize = 16;

/// Derive the stable fingerprint for a payment method.
pub fn fingerprint(method: &PaymentMethodInfo) -> String {
    let joined = format!(
        "{}|{}|{}|{}|{}",
        method.method_type, method.brand, method.last4, method.exp_month, method.exp_year
    );
    let digest = Sha256::digest(joined.as_bytes());

    let mut hex = String::with_capacity(FINGERPRINT_LEN);
    for byte in &digest[..FINGERPRINT_LEN / 2] {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visa_card() -> PaymentMethodInfo {
        PaymentMethodInfo {
            method_type: "card".to_string(),
            brand: "visa".to_string(),
            last4: "4242".to_string(),
            exp_month: 12,
            exp_year: 2027,
        }
    }

    #[test]
    fn test_fingerprint_stable() {
        assert_eq!(fingerprint(&visa_card()), fingerprint(&visa_card()));
        assert_eq!(fingerprint(&visa_card()).len(), FINGERPRINT_LEN);
    }

    #[test]
    fn test_fingerprint_separates_methods() {
        let mut other = visa_card();
        other.last4 = "4243".to_string();
        assert_ne!(fingerprint(&visa_card()), fingerprint(&other));

        let mut expiry_bump = visa_card();
        expiry_bump.exp_year = 2028;
        assert_ne!(fingerprint(&visa_card()), fingerprint(&expiry_bump));
    }
}
