//! Server network and storage settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Server network and connection settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// HTTP / WebSocket port (`0` picks a free port).
    pub port: u16,
    /// Interval between server-initiated WebSocket pings, in seconds.
    pub heartbeat_interval_secs: u64,
    /// Disconnect a client after this long without a pong, in seconds.
    pub heartbeat_timeout_secs: u64,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Capacity of each connection's outbound queue.
    pub send_queue_capacity: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            max_message_size: 1024 * 1024,
            send_queue_capacity: 256,
        }
    }
}

/// Where charts and static assets live.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageSettings {
    /// Flat directory of `.pro` / `.cho` chart files.
    pub songs_dir: PathBuf,
    /// Static asset root served at `/`.
    pub public_dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            songs_dir: PathBuf::from("public").join("partitions"),
            public_dir: PathBuf::from("public"),
        }
    }
}
