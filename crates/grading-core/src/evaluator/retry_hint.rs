//! Extraction of a provider-suggested retry wait from a quota error.
//!
//! Three forms are recognised, checked in this order:
//! 1. the `Retry-After` header in whole seconds,
//! 2. a `retryDelay` detail in the error body (`"20s"`, `"20.5s"`),
//! 3. a `retry in 20.507s` fragment in the error message.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

/// Parse a `Retry-After` header value given in seconds.
pub fn from_header(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Parse a protobuf-style duration string such as `"20s"` or `"20.5s"`.
pub fn parse_seconds(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().strip_suffix('s')?.parse().ok()?;
    to_duration(secs)
}

/// Millisecond precision is all a backoff needs.
fn to_duration(secs: f64) -> Option<Duration> {
    if secs.is_finite() && secs >= 0.0 {
        Some(Duration::from_millis((secs * 1000.0).round() as u64))
    } else {
        None
    }
}

/// Look for a `retryDelay` entry among the error body's `details`.
pub fn from_error_body(body: &serde_json::Value) -> Option<Duration> {
    body.pointer("/error/details")
        .and_then(|d| d.as_array())
        .into_iter()
        .flatten()
        .filter_map(|detail| detail.get("retryDelay").and_then(|v| v.as_str()))
        .find_map(parse_seconds)
}

fn message_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)retry in\s+([0-9]+(?:\.[0-9]+)?)\s*s").ok())
        .as_ref()
}

/// Find a `retry in 20.507s` fragment in free text.
pub fn from_message(message: &str) -> Option<Duration> {
    let caps = message_pattern()?.captures(message)?;
    let secs: f64 = caps.get(1)?.as_str().parse().ok()?;
    to_duration(secs)
}

/// Combine all three sources, first match wins.
pub fn extract(header: Option<&str>, body: &str) -> Option<Duration> {
    if let Some(wait) = header.and_then(from_header) {
        return Some(wait);
    }
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(wait) = from_error_body(&json) {
            return Some(wait);
        }
        if let Some(msg) = json.pointer("/error/message").and_then(|m| m.as_str()) {
            if let Some(wait) = from_message(msg) {
                return Some(wait);
            }
        }
    }
    from_message(body)
}
