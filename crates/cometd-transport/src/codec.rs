//! Wire format.
//!
//! Requests are a JSON array of messages. Replies are a JSON array or a
//! single object, optionally wrapped in a `/* ... */` comment guard
//! (same-domain) or in a `callback(...)` invocation (cross-domain).

use cometd_core::{Message, RequestError};
use serde_json::Value;
use tracing::warn;

/// Encode a batch as a JSON array.
pub fn encode(messages: &[Message]) -> Result<String, RequestError> {
    serde_json::to_string(messages).map_err(|e| RequestError::Encode(e.to_string()))
}

/// Remove a surrounding `/* ... */` guard, if present.
pub fn strip_comment_guard(body: &str) -> &str {
    let trimmed = body.trim();
    trimmed
        .strip_prefix("/*")
        .and_then(|rest| rest.strip_suffix("*/"))
        .map_or(trimmed, str::trim)
}

/// Extract the argument of a `callback(...)` invocation.
pub fn unwrap_callback<'a>(body: &'a str, callback: &str) -> Result<&'a str, RequestError> {
    body.trim()
        .trim_end_matches(';')
        .trim_end()
        .strip_prefix(callback)
        .map(str::trim_start)
        .and_then(|rest| rest.strip_prefix('('))
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(|| RequestError::Decode(format!("reply is not a {callback}(...) invocation")))
}

/// Decode a reply body that is a bare JSON array or object.
///
/// Only a body that is not JSON, or not an array or object, is an error.
/// Individual messages that do not parse are logged and skipped.
pub fn decode(body: &str) -> Result<Vec<Message>, RequestError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| RequestError::Decode(e.to_string()))?;
    let items = match value {
        Value::Array(items) => items,
        object @ Value::Object(_) => vec![object],
        other => {
            return Err(RequestError::Decode(format!(
                "expected an array of messages, got {other}"
            )));
        }
    };
    let messages = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value::<Message>(item) {
            Ok(message) => Some(message),
            Err(error) => {
                warn!(index, error = %error, "dropping malformed message");
                None
            }
        })
        .collect();
    Ok(messages)
}

/// Decode a same-domain reply, with or without comment guard.
pub fn decode_same_domain(body: &str) -> Result<Vec<Message>, RequestError> {
    decode(strip_comment_guard(body))
}

/// Decode a cross-domain reply wrapped in `callback(...)`.
pub fn decode_cross_domain(body: &str, callback: &str) -> Result<Vec<Message>, RequestError> {
    decode(strip_comment_guard(unwrap_callback(body, callback)?))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
