//! Wire value codec.
//!
//! Values travel as JSON text. The engine's dialect has two properties this
//! module accounts for: integers span the full unsigned 64-bit range, and
//! several reply fields (`value`, `search_criteria`, bulk entries) carry JSON
//! text embedded inside JSON strings, sometimes more than one level deep.
//! [`decode`] unwraps those layers so callers see plain structured values.

use crate::error::{DecodeError, ProtocolError};
use serde::Serialize;
use serde_json::Value;

/// How many layers of embedded wire text [`decode`] unwraps before it stops.
pub const MAX_UNWRAP_DEPTH: usize = 32;

/// Encodes a value as wire text.
///
/// Integers are written exactly as held; `u64::MAX` is emitted as
/// `18446744073709551615`, never through a float.
pub fn encode(value: &Value) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(value)?)
}

/// Encodes any serializable value as wire text.
pub fn encode_serializable<T: Serialize + ?Sized>(value: &T) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(value)?)
}

/// Decodes wire text into a normalized value.
///
/// Normalization rules:
/// - a string of ASCII digits whose value fits in a `u64` stays a string;
/// - any other string holding JSON text is replaced by the decoded value,
///   recursively;
/// - map keys that are `u64` decimal text are rewritten in canonical form.
pub fn decode(text: &str) -> Result<Value, DecodeError> {
    let value: Value = serde_json::from_str(text)?;
    Ok(normalize(value, 0))
}

/// Decodes a wire frame given as raw bytes.
pub fn decode_bytes(bytes: &[u8]) -> Result<Value, DecodeError> {
    let text = std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)?;
    decode(text)
}

/// Returns whether `text` is non-empty ASCII decimal that fits in a `u64`.
///
/// Leading zeros are allowed; `"007"` qualifies.
pub fn is_u64_text(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) && text.parse::<u64>().is_ok()
}

fn normalize(value: Value, depth: usize) -> Value {
    match value {
        Value::String(s) => unwrap_string(s, depth),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| normalize(item, depth))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (normalize_key(k), normalize(v, depth)))
                .collect(),
        ),
        other => other,
    }
}

fn unwrap_string(s: String, depth: usize) -> Value {
    if is_u64_text(&s) {
        return Value::String(s);
    }
    if depth >= MAX_UNWRAP_DEPTH {
        tracing::debug!("embedded wire text nested deeper than {}", MAX_UNWRAP_DEPTH);
        return Value::String(s);
    }
    match embedded_value(&s) {
        Some(inner) => normalize(inner, depth + 1),
        None => Value::String(s),
    }
}

/// Parses a string leaf as embedded wire text.
///
/// A number is only accepted when its canonical rendering is the text itself,
/// so `"1e3"` or a 25-digit string never turns into a lossy float.
fn embedded_value(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let value: Value = serde_json::from_str(trimmed).ok()?;
    match &value {
        Value::Number(n) if n.to_string() != trimmed => None,
        _ => Some(value),
    }
}

fn normalize_key(key: String) -> String {
    match key.parse::<u64>() {
        Ok(n) if is_u64_text(&key) => n.to_string(),
        _ => key,
    }
}
