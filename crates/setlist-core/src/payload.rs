//! Lenient coercion of client payload fields.
//!
//! Browser clients send loosely-typed JSON: numbers as strings, booleans as
//! `0`/`1`, missing fields. Nothing here rejects input; every helper maps an
//! arbitrary value to a safe default instead.

use serde_json::Value;

/// Numeric value of a payload field, `NaN` when it has none.
///
/// Numbers pass through, booleans map to `1`/`0`, strings are parsed after
/// trimming (an empty string is `0`), `null`/missing is `0`.
pub fn to_number(value: Option<&Value>) -> f64 {
    match value {
        None | Some(Value::Null) => 0.0,
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                0.0
            } else {
                s.parse::<f64>().unwrap_or(f64::NAN)
            }
        }
        Some(Value::Array(_) | Value::Object(_)) => f64::NAN,
    }
}

/// Scroll position clamped into `[0, 1]`; non-numeric input becomes `0`.
pub fn clamp_scroll(value: Option<&Value>) -> f64 {
    let n = to_number(value);
    if n.is_nan() { 0.0 } else { n.clamp(0.0, 1.0) }
}

/// Truthiness of a payload field.
///
/// `false`, `0`, `NaN`, the empty string, `null` and missing are false;
/// everything else (including empty arrays and objects) is true.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_) | Value::Object(_)) => true,
    }
}

/// String form of a payload field, used for secret comparison.
///
/// Falsy values become `""`. Integral numbers print without a fractional
/// part so `1234` and `1234.0` both read `"1234"`.
pub fn string_form(value: Option<&Value>) -> String {
    if !is_truthy(value) {
        return String::new();
    }
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}
