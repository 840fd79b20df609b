//! Wire types for the realtime channel.
//!
//! Client frames carry an event name, a payload and an optional ack id.
//! The server answers with [`Ack`]s (only when an id was supplied) and pushes
//! [`ServerEvent`]s.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::errors::SyncError;

/// Inbound event names.
pub mod inbound {
    /// Move the sender into a room.
    pub const JOIN_SESSION: &str = "join-session";
    /// Leader selects a chart.
    pub const CHANGE_SONG: &str = "change-song";
    /// Leader scroll position.
    pub const SCROLL_SYNC: &str = "scroll-sync";
    /// Leader font size.
    pub const SYNC_FONT: &str = "sync-font";
    /// Leader transposition.
    pub const SYNC_TRANSPOSE: &str = "sync-transpose";
    /// Leader auto-scroll state.
    pub const SYNC_AUTOSCROLL: &str = "sync-autoscroll";
}

/// Outbound event names.
pub mod outbound {
    /// Greeting sent on connect.
    pub const CONNECTED: &str = "connected";
    /// Reply to `join-session`.
    pub const SESSION_JOINED: &str = "session-joined";
    /// Load the named chart.
    pub const LOAD_SONG: &str = "load-song";
    /// Apply a scroll position.
    pub const APPLY_SCROLL: &str = "apply-scroll";
    /// Apply a font size.
    pub const APPLY_FONT: &str = "apply-font";
    /// Apply a transposition.
    pub const APPLY_TRANSPOSE: &str = "apply-transpose";
    /// Apply auto-scroll state.
    pub const APPLY_AUTOSCROLL: &str = "apply-autoscroll";
    /// A chart was saved; clients should refetch it.
    pub const SONG_UPDATED: &str = "song-updated";
}

/// A client-to-server frame.
#[derive(Clone, Debug, Deserialize)]
pub struct ClientFrame {
    /// Ack correlation id. Frames without one get no reply.
    #[serde(default)]
    pub id: Option<String>,
    /// Event name.
    pub event: String,
    /// Event payload.
    #[serde(default)]
    pub payload: Value,
}

impl ClientFrame {
    /// Parse a text frame.
    ///
    /// On failure, returns the ack id if one could still be read from the
    /// raw JSON so the client can be told its frame was rejected.
    pub fn parse(text: &str) -> Result<Self, Option<String>> {
        let raw: Value = serde_json::from_str(text).map_err(|_| None)?;
        let id = raw.get("id").and_then(Value::as_str).map(str::to_string);
        serde_json::from_value(raw).map_err(|_| id)
    }
}

/// Reply to a frame that carried an id.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Ack {
    /// Echoed correlation id.
    pub id: String,
    /// Whether the event was accepted.
    pub ok: bool,
    /// Rejection reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Resolved room for `join-session`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    /// Set when a scroll event was accepted but dropped by the throttle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throttled: Option<bool>,
}

impl Ack {
    /// Positive ack.
    pub fn ok(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ok: true,
            error: None,
            room: None,
            throttled: None,
        }
    }

    /// Negative ack carrying the error's wire message.
    pub fn rejected(id: impl Into<String>, err: SyncError) -> Self {
        Self {
            id: id.into(),
            ok: false,
            error: Some(err.to_string()),
            room: None,
            throttled: None,
        }
    }

    /// Attach the resolved room.
    #[must_use]
    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    /// Mark as throttled.
    #[must_use]
    pub fn with_throttled(mut self) -> Self {
        self.throttled = Some(true);
        self
    }

    /// Serialize for the wire.
    pub fn to_json(&self) -> Option<Arc<String>> {
        to_wire(self)
    }
}

/// A server-to-client event.
#[derive(Clone, Debug, Serialize)]
pub struct ServerEvent {
    /// Event name.
    #[serde(rename = "type")]
    pub event_type: &'static str,
    /// RFC 3339 timestamp.
    pub timestamp: String,
    /// Event payload.
    pub data: Value,
}

impl ServerEvent {
    /// Build an event stamped with the current time.
    pub fn new(event_type: &'static str, data: Value) -> Self {
        Self {
            event_type,
            timestamp: chrono::Utc::now().to_rfc3339(),
            data,
        }
    }

    /// Serialize for the wire.
    pub fn to_json(&self) -> Option<Arc<String>> {
        to_wire(self)
    }
}

fn to_wire<T: Serialize>(value: &T) -> Option<Arc<String>> {
    match serde_json::to_string(value) {
        Ok(json) => Some(Arc::new(json)),
        Err(e) => {
            warn!(error = %e, "failed to serialize outbound message");
            None
        }
    }
}
