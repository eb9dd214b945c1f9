//! Operation log: an audit trail of mutating admin requests.
//!
//! - [`middleware`]: captures `POST`/`PUT`/`DELETE` requests under `/admin/api/`
//! - [`cleanup`]: periodic retention of the newest rows
//!
//! Bodies are stored as text. JSON bodies are pretty-printed with password fields masked, and
//! anything longer than the configured limit is cut with a [`TRUNCATION_SUFFIX`].

pub mod cleanup;
pub mod middleware;

use axum::http::{HeaderMap, header};
use serde_json::Value;
use std::net::SocketAddr;

pub const TRUNCATION_SUFFIX: &str = "...(truncated)";

const REDACTED: &str = "******";

/// Render a captured body for storage.
pub fn format_body(bytes: &[u8], max_bytes: usize) -> String {
    if bytes.is_empty() {
        return String::new();
    }

    let text = match serde_json::from_slice::<Value>(bytes) {
        Ok(mut value) => {
            redact_passwords(&mut value);
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| String::from_utf8_lossy(bytes).into_owned())
        }
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    };

    truncate(text, max_bytes)
}

fn truncate(mut text: String, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text;
    }

    let mut cut = max_bytes;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    text.push_str(TRUNCATION_SUFFIX);
    text
}

fn redact_passwords(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, field) in map.iter_mut() {
                if key.to_ascii_lowercase().contains("password") && field.is_string() {
                    *field = Value::String(REDACTED.to_string());
                } else {
                    redact_passwords(field);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_passwords),
        _ => {}
    }
}

/// Client address: first `X-Forwarded-For` hop, then `X-Real-IP`, then the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = real_ip {
        return ip.to_string();
    }

    peer.map(|addr| addr.ip().to_string()).unwrap_or_default()
}

pub fn user_agent(headers: &HeaderMap) -> String {
    headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_json_is_pretty_printed() {
        let formatted = format_body(br#"{"name":"editor","permission_ids":[1,2]}"#, 1024);
        assert_eq!(formatted, "{\n  \"name\": \"editor\",\n  \"permission_ids\": [\n    1,\n    2\n  ]\n}");
    }

    #[test]
    fn test_passwords_are_masked() {
        let formatted = format_body(br#"{"old_password":"hunter22","new_password":"secret1","nested":{"password":"x"}}"#, 1024);
        assert!(!formatted.contains("hunter22"));
        assert!(!formatted.contains("secret1"));
        assert_eq!(formatted.matches(REDACTED).count(), 3);
    }

    #[test]
    fn test_non_json_is_kept_verbatim() {
        assert_eq!(format_body(b"plain text", 1024), "plain text");
        assert_eq!(format_body(b"", 1024), "");
    }

    #[test]
    fn test_truncation() {
        let body = "a".repeat(100);
        let formatted = format_body(body.as_bytes(), 10);
        assert_eq!(formatted, format!("{}{}", "a".repeat(10), TRUNCATION_SUFFIX));

        // Never splits a multi-byte character
        let body = "é".repeat(10);
        let formatted = format_body(body.as_bytes(), 5);
        assert_eq!(formatted, format!("{}{}", "é".repeat(2), TRUNCATION_SUFFIX));

        let exact = "b".repeat(10);
        assert_eq!(format_body(exact.as_bytes(), 10), exact);
    }

    #[test]
    fn test_client_ip_precedence() {
        let peer: SocketAddr = "10.0.0.9:5555".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, Some(peer)), "10.0.0.9");
        assert_eq!(client_ip(&headers, None), "");

        headers.insert("x-real-ip", HeaderValue::from_static("192.168.1.2"));
        assert_eq!(client_ip(&headers, Some(peer)), "192.168.1.2");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_ip(&headers, Some(peer)), "203.0.113.7");
    }
}
