//! Content hashing for request payloads
//!
//! Requests are hashed over a canonical JSON encoding with recursively
//! sorted object keys, so two structurally equal payloads hash identically
//! regardless of field order, and any value change moves the digest.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// SHA-256 over the canonical encoding of `payload`, lowercase hex
/// (64 characters).
pub fn content_hash(payload: &Value) -> String {
    let digest = Sha256::digest(canonical_bytes(payload));
    let mut hex = String::with_capacity(64);
    for byte in digest {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}

/// Canonical JSON encoding: object keys sorted at every nesting level,
/// arrays kept in order, scalars in their compact JSON form.
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    write_canonical(&mut buf, value);
    buf
}

fn write_canonical(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();

            buf.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    buf.push(b',');
                }
                let quoted =
                    serde_json::to_string(key).expect("string serialization cannot fail");
                buf.extend_from_slice(quoted.as_bytes());
                buf.push(b':');
                write_canonical(buf, &map[key.as_str()]);
            }
            buf.push(b'}');
        }
        Value::Array(items) => {
            buf.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.push(b',');
                }
                write_canonical(buf, item);
            }
            buf.push(b']');
        }
        scalar => buf.extend_from_slice(scalar.to_string().as_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hash_is_64_hex_chars() {
        let hash = content_hash(&json!({"amount": 5000, "currency": "usd"}));
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_field_order_does_not_matter() {
        let a: Value =
            serde_json::from_str(r#"{"amount": 5000, "currency": "usd", "customer": "c_1"}"#)
                .unwrap();
        let b: Value =
            serde_json::from_str(r#"{"customer": "c_1", "currency": "usd", "amount": 5000}"#)
                .unwrap();
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_nested_objects_canonicalized() {
        let a = json!({"card": {"last4": "4242", "brand": "visa"}, "amount": 100});
        let b = json!({"amount": 100, "card": {"brand": "visa", "last4": "4242"}});
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_value_change_moves_hash() {
        let a = json!({"amount": 5000});
        let b = json!({"amount": 5001});
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_array_order_matters() {
        let a = json!({"items": [1, 2, 3]});
        let b = json!({"items": [3, 2, 1]});
        assert_ne!(content_hash(&a), content_hash(&b));
    }
}
