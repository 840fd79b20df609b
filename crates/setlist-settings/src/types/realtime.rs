//! Realtime broadcast settings.

use serde::{Deserialize, Serialize};

/// Who receives a participant's sync events and save notifications.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BroadcastScope {
    /// Only members of the sender's room.
    #[default]
    Room,
    /// Every connected participant.
    Global,
}

impl BroadcastScope {
    /// Parse a scope name (`room` / `global`, case-insensitive).
    pub fn parse(val: &str) -> Option<Self> {
        match val.to_ascii_lowercase().as_str() {
            "room" => Some(Self::Room),
            "global" => Some(Self::Global),
            _ => None,
        }
    }
}

/// Broadcast core behavior.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RealtimeSettings {
    /// Fan-out scope for sync events and `song-updated`.
    pub broadcast_scope: BroadcastScope,
    /// Require the leader PIN on socket sync events. The save endpoint is
    /// gated regardless.
    pub require_pin_for_sync: bool,
    /// Minimum spacing of admitted scroll events per connection, in ms.
    pub scroll_throttle_ms: u64,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            broadcast_scope: BroadcastScope::Room,
            require_pin_for_sync: true,
            scroll_throttle_ms: 80,
        }
    }
}
