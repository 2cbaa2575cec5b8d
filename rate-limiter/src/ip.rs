//! Client IP resolution
//!
//! Proxy-aware extraction for the subject's client-IP dimension: the first
//! `X-Forwarded-For` entry, then `X-Real-IP`, then the direct peer
//! address. First match wins.

use http::HeaderMap;
use std::net::IpAddr;

/// Resolve the client address from proxy headers, falling back to `peer`.
pub fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>) -> Option<IpAddr> {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            if let Ok(ip) = first.trim().parse() {
                return Some(ip);
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        if let Ok(ip) = real_ip.trim().parse() {
            return Some(ip);
        }
    }

    peer
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn peer() -> Option<IpAddr> {
        Some("10.0.0.1".parse().unwrap())
    }

    #[test]
    fn test_forwarded_for_first_entry_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 198.51.100.2"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.9"));

        assert_eq!(
            client_ip(&headers, peer()),
            Some("203.0.113.7".parse().unwrap())
        );
    }

    #[test]
    fn test_real_ip_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.9"));

        assert_eq!(
            client_ip(&headers, peer()),
            Some("198.51.100.9".parse().unwrap())
        );
    }

    #[test]
    fn test_peer_fallback() {
        let headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, peer()), peer());
        assert_eq!(client_ip(&headers, None), None);
    }

    #[test]
    fn test_garbage_forwarded_for_skipped() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("not-an-ip"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.9"));

        assert_eq!(
            client_ip(&headers, peer()),
            Some("198.51.100.9".parse().unwrap())
        );
    }
}
