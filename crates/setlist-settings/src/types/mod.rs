//! Settings types.
//!
//! All structs use `#[serde(default)]` so a settings file only needs the keys
//! it overrides.

mod realtime;
mod server;

pub use realtime::{BroadcastScope, RealtimeSettings};
pub use server::{ServerSettings, StorageSettings};

use serde::{Deserialize, Serialize};
use setlist_core::logging::LogFormat;

/// Default shared secret when neither the file nor `LEADER_PIN` sets one.
pub const DEFAULT_LEADER_PIN: &str = "1234";

/// Root settings object.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SetlistSettings {
    /// Network settings.
    pub server: ServerSettings,
    /// Chart storage and static asset locations.
    pub storage: StorageSettings,
    /// Broadcast behavior.
    pub realtime: RealtimeSettings,
    /// Log output.
    pub logging: LoggingSettings,
    /// Shared secret required for every mutating action.
    pub leader_pin: String,
}

impl Default for SetlistSettings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            storage: StorageSettings::default(),
            realtime: RealtimeSettings::default(),
            logging: LoggingSettings::default(),
            leader_pin: DEFAULT_LEADER_PIN.to_string(),
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}
