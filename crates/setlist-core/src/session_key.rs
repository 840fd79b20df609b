//! Session (room) key sanitizing.
//!
//! Every room identifier in the system comes out of [`sanitize_session_key`].
//! The function is total (always yields a usable key) and idempotent.

use serde_json::Value;

use crate::payload::is_truthy;

/// Room every participant starts in, and the fallback for unusable input.
pub const DEFAULT_SESSION_KEY: &str = "default";

/// Maximum length of a room key, in characters.
pub const MAX_SESSION_KEY_LEN: usize = 40;

/// Turn raw client input into a room key.
///
/// Trims the input, keeps only `[A-Za-z0-9_-]`, truncates to
/// [`MAX_SESSION_KEY_LEN`] characters and falls back to
/// [`DEFAULT_SESSION_KEY`] when nothing is left.
pub fn sanitize_session_key(raw: &str) -> String {
    let key: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .take(MAX_SESSION_KEY_LEN)
        .collect();

    if key.is_empty() {
        DEFAULT_SESSION_KEY.to_owned()
    } else {
        key
    }
}

/// Sanitize a session key taken from a JSON payload field.
///
/// Falsy values (missing, `null`, `false`, `0`, `""`) resolve to the default
/// room. Anything else is sanitized from its browser string form, so `true`
/// reads `"true"`, `[1, 2]` reads `"1,2"` and an object reads
/// `"[object Object]"`.
pub fn sanitize_session_value(raw: Option<&Value>) -> String {
    if !is_truthy(raw) {
        return DEFAULT_SESSION_KEY.to_owned();
    }
    raw.map_or_else(
        || DEFAULT_SESSION_KEY.to_owned(),
        |value| sanitize_session_key(&browser_string(value)),
    )
}

fn browser_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Object(_) => "[object Object]".to_owned(),
        Value::Array(items) => items
            .iter()
            .map(browser_string)
            .collect::<Vec<_>>()
            .join(","),
        Value::Bool(b) => b.to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
    }
}
