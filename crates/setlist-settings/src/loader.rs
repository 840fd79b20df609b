//! Building a [`SetlistSettings`] from its sources.
//!
//! [`load_with`] serializes the compiled defaults to JSON, overlays the
//! settings file (if present) with [`deep_merge`], deserializes, then applies
//! environment overrides and [`validate`]s the result. Environment values that
//! do not parse are logged and skipped.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::Value;
use setlist_core::logging::LogFormat;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::{BroadcastScope, SetlistSettings};

/// Resolve the default settings file path (`~/.setlist/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".setlist").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<SetlistSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON, or a resulting empty leader
/// PIN, is an error.
pub fn load_settings_from_path(path: &Path) -> Result<SetlistSettings> {
    load_with(path, |name| std::env::var(name).ok())
}

/// Load settings from `path`, reading overrides through `lookup`.
pub fn load_with(
    path: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<SetlistSettings> {
    let defaults =
        serde_json::to_value(SetlistSettings::default()).map_err(SettingsError::json(path))?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let user: Value = serde_json::from_str(&content).map_err(SettingsError::json(path))?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: SetlistSettings =
        serde_json::from_value(merged).map_err(SettingsError::json(path))?;
    apply_overrides_from(&mut settings, lookup);
    validate(&settings)?;
    Ok(settings)
}

/// Reject settings the server cannot run with.
pub fn validate(settings: &SetlistSettings) -> Result<()> {
    if settings.leader_pin.is_empty() {
        return Err(SettingsError::InvalidValue("leader PIN must not be empty".into()));
    }
    let server = &settings.server;
    if server.heartbeat_timeout_secs <= server.heartbeat_interval_secs {
        return Err(SettingsError::InvalidValue(format!(
            "heartbeatTimeoutSecs ({}) must exceed heartbeatIntervalSecs ({})",
            server.heartbeat_timeout_secs, server.heartbeat_interval_secs
        )));
    }
    if settings.server.send_queue_capacity == 0 {
        return Err(SettingsError::InvalidValue(
            "sendQueueCapacity must be at least 1".into(),
        ));
    }
    Ok(())
}

/// Overlay `source` onto `target`, returning the result.
///
/// Objects merge key by key; any other `source` value replaces `target`
/// wholesale. `null` in `source` means "not set" and leaves `target` alone.
pub fn deep_merge(mut target: Value, source: Value) -> Value {
    merge_into(&mut target, source);
    target
}

fn merge_into(target: &mut Value, source: Value) {
    match (target, source) {
        (_, Value::Null) => {}
        (Value::Object(into), Value::Object(from)) => {
            for (key, value) in from {
                match into.get_mut(&key) {
                    Some(slot) => merge_into(slot, value),
                    None if value.is_null() => {}
                    None => {
                        let _ = into.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Apply overrides from an arbitrary variable source.
///
/// - Integers must be valid and within range
/// - Booleans accept `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`
/// - Invalid values are ignored with a warning (fall back to file/default)
pub fn apply_overrides_from(
    settings: &mut SetlistSettings,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let env = EnvSource { lookup };

    // server
    if let Some(v) = env.ranged("PORT", 0..=u16::MAX) {
        settings.server.port = v;
    }
    if let Some(v) = env.string("SETLIST_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.ranged("SETLIST_HEARTBEAT_INTERVAL_SECS", 1..=3600) {
        settings.server.heartbeat_interval_secs = v;
    }

    // auth
    if let Some(v) = env.string("LEADER_PIN") {
        settings.leader_pin = v;
    }

    // storage
    if let Some(v) = env.string("SETLIST_SONGS_DIR") {
        settings.storage.songs_dir = PathBuf::from(v);
    }
    if let Some(v) = env.string("SETLIST_PUBLIC_DIR") {
        settings.storage.public_dir = PathBuf::from(v);
    }

    // realtime
    if let Some(v) = env.parsed("SETLIST_BROADCAST_SCOPE", BroadcastScope::parse) {
        settings.realtime.broadcast_scope = v;
    }
    if let Some(v) = env.parsed("SETLIST_REQUIRE_PIN_FOR_SYNC", parse_bool) {
        settings.realtime.require_pin_for_sync = v;
    }
    if let Some(v) = env.ranged("SETLIST_SCROLL_THROTTLE_MS", 0..=10_000) {
        settings.realtime.scroll_throttle_ms = v;
    }

    // logging
    if let Some(v) = env.string("SETLIST_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.parsed("SETLIST_LOG_FORMAT", LogFormat::parse) {
        settings.logging.format = v;
    }
}

/// Parse an on/off flag: `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`,
/// case-insensitive.
pub fn parse_bool(val: &str) -> Option<bool> {
    const ON: [&str; 4] = ["true", "1", "yes", "on"];
    const OFF: [&str; 4] = ["false", "0", "no", "off"];
    let val = val.trim();
    if ON.iter().any(|v| v.eq_ignore_ascii_case(val)) {
        Some(true)
    } else if OFF.iter().any(|v| v.eq_ignore_ascii_case(val)) {
        Some(false)
    } else {
        None
    }
}

/// Parse a number and accept it only inside `range`.
pub fn parse_in_range<T>(val: &str, range: RangeInclusive<T>) -> Option<T>
where
    T: FromStr + PartialOrd,
{
    val.trim().parse().ok().filter(|n| range.contains(n))
}

struct EnvSource<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvSource<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn parsed<T>(&self, name: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        let val = self.string(name)?;
        let result = parse(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid env var, ignoring");
        }
        result
    }

    fn ranged<T>(&self, name: &str, range: RangeInclusive<T>) -> Option<T>
    where
        T: FromStr + PartialOrd + Clone,
    {
        self.parsed(name, |v| parse_in_range(v, range.clone()))
    }
}
