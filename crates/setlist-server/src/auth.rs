//! Leader PIN gate.

use serde_json::Value;
use setlist_core::payload::string_form;

/// Authorizes mutating actions against the configured leader PIN.
///
/// The comparison is plain string equality on the supplied value's string
/// form, so `1234` and `"1234"` both match a `"1234"` secret.
#[derive(Clone, Debug)]
pub struct PinGate {
    secret: String,
}

impl PinGate {
    /// Create a gate for `secret`.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Whether `supplied` matches the secret.
    pub fn check(&self, supplied: Option<&Value>) -> bool {
        string_form(supplied) == self.secret
    }
}
