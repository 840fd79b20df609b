//! Inbound frame dispatch.
//!
//! A text frame is parsed into a [`ClientFrame`], mapped onto the closed
//! [`InboundEvent`] set, gated by the leader PIN and executed against the
//! [`RoomRegistry`]. The return value is the ack to send back, if the frame
//! asked for one.

use std::sync::Arc;
use std::time::Instant;

use metrics::counter;
use serde_json::{Value, json};
use setlist_core::payload::{clamp_scroll, is_truthy};
use setlist_core::session_key::sanitize_session_value;
use setlist_settings::{BroadcastScope, RealtimeSettings};
use tracing::{debug, instrument, warn};

use super::connection::ClientConnection;
use super::rooms::RoomRegistry;
use crate::auth::PinGate;
use crate::errors::SyncError;
use crate::metrics::{WS_EVENTS_REJECTED_TOTAL, WS_EVENTS_TOTAL, WS_SCROLL_THROTTLED_TOTAL};
use crate::protocol::{Ack, ClientFrame, ServerEvent, inbound, outbound};

/// Everything the dispatcher needs besides the connection itself.
pub struct SyncContext {
    /// Room membership and fan-out.
    pub registry: Arc<RoomRegistry>,
    /// Leader PIN gate.
    pub gate: PinGate,
    /// Scope and gating options.
    pub realtime: RealtimeSettings,
}

/// The closed set of events a participant may send.
#[derive(Clone, Debug, PartialEq)]
pub enum InboundEvent {
    /// Move to another room.
    JoinSession {
        /// Raw requested key, sanitized on join.
        session_id: Option<Value>,
    },
    /// Select a chart for the room.
    ChangeSong {
        /// Chart name, relayed as given.
        file_name: Value,
    },
    /// Scroll position, already clamped into `[0, 1]`.
    ScrollSync {
        /// Position.
        pos: f64,
    },
    /// Font size.
    SyncFont {
        /// Size, relayed as given.
        font_size: Value,
    },
    /// Transposition.
    SyncTranspose {
        /// Semitone offset, relayed as given.
        transpose_value: Value,
    },
    /// Auto-scroll state.
    SyncAutoscroll {
        /// Normalized on/off.
        active: bool,
        /// Speed, relayed as given.
        speed: Value,
    },
}

fn field(payload: &Value, key: &str) -> Value {
    payload.get(key).cloned().unwrap_or(Value::Null)
}

impl InboundEvent {
    /// Map an event name and payload onto an [`InboundEvent`].
    pub fn parse(event: &str, payload: &Value) -> Result<Self, SyncError> {
        let parsed = match event {
            inbound::JOIN_SESSION => Self::JoinSession {
                session_id: match payload {
                    Value::Object(map) => map.get("sessionId").cloned(),
                    other => Some(other.clone()),
                },
            },
            inbound::CHANGE_SONG => Self::ChangeSong {
                file_name: field(payload, "fileName"),
            },
            inbound::SCROLL_SYNC => Self::ScrollSync {
                pos: clamp_scroll(payload.get("pos")),
            },
            inbound::SYNC_FONT => Self::SyncFont {
                font_size: field(payload, "fontSize"),
            },
            inbound::SYNC_TRANSPOSE => Self::SyncTranspose {
                transpose_value: field(payload, "transposeValue"),
            },
            inbound::SYNC_AUTOSCROLL => Self::SyncAutoscroll {
                active: is_truthy(payload.get("active")),
                speed: field(payload, "speed"),
            },
            _ => return Err(SyncError::UnknownEvent),
        };
        Ok(parsed)
    }

    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinSession { .. } => inbound::JOIN_SESSION,
            Self::ChangeSong { .. } => inbound::CHANGE_SONG,
            Self::ScrollSync { .. } => inbound::SCROLL_SYNC,
            Self::SyncFont { .. } => inbound::SYNC_FONT,
            Self::SyncTranspose { .. } => inbound::SYNC_TRANSPOSE,
            Self::SyncAutoscroll { .. } => inbound::SYNC_AUTOSCROLL,
        }
    }

    /// Whether the event mutates shared state and needs the leader PIN.
    pub fn is_gated(&self) -> bool {
        !matches!(self, Self::JoinSession { .. })
    }
}

/// What happened to an accepted event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Relayed to the room.
    Relayed,
    /// Joined the named room.
    Joined(String),
    /// Scroll event dropped by the throttle.
    Throttled,
}

/// Handle one inbound text frame.
///
/// Returns the ack to send back, or `None` when the frame had no id.
#[instrument(skip_all, fields(conn_id = %connection.id, event))]
pub async fn handle_message(
    text: &str,
    connection: &ClientConnection,
    ctx: &SyncContext,
) -> Option<Ack> {
    let frame = match ClientFrame::parse(text) {
        Ok(frame) => frame,
        Err(id) => {
            warn!("invalid frame received");
            reject("invalid", SyncError::InvalidFrame);
            return id.map(|id| Ack::rejected(id, SyncError::InvalidFrame));
        }
    };
    let _ = tracing::Span::current().record("event", frame.event.as_str());

    let result = match InboundEvent::parse(&frame.event, &frame.payload) {
        Ok(event) => dispatch(event, &frame.payload, connection, ctx).await,
        Err(err) => {
            warn!("unknown event");
            reject("unknown", err);
            Err(err)
        }
    };

    let id = frame.id?;
    Some(match result {
        Ok(Outcome::Relayed) => Ack::ok(id),
        Ok(Outcome::Joined(room)) => Ack::ok(id).with_room(room),
        Ok(Outcome::Throttled) => Ack::ok(id).with_throttled(),
        Err(err) => Ack::rejected(id, err),
    })
}

fn reject(event: &'static str, err: SyncError) {
    counter!(WS_EVENTS_REJECTED_TOTAL, "event" => event, "reason" => err.reason()).increment(1);
}

/// Execute a parsed event.
pub async fn dispatch(
    event: InboundEvent,
    payload: &Value,
    connection: &ClientConnection,
    ctx: &SyncContext,
) -> Result<Outcome, SyncError> {
    let name = event.name();
    if event.is_gated() && ctx.realtime.require_pin_for_sync && !ctx.gate.check(payload.get("pin"))
    {
        warn!(event = name, "rejected: invalid pin");
        reject(name, SyncError::InvalidPin);
        return Err(SyncError::InvalidPin);
    }
    counter!(WS_EVENTS_TOTAL, "event" => name).increment(1);

    let relay = match event {
        InboundEvent::JoinSession { session_id } => {
            let key = sanitize_session_value(session_id.as_ref());
            let room = ctx.registry.join(connection, &key).await;
            let _ = connection.push(&ServerEvent::new(
                outbound::SESSION_JOINED,
                json!({ "room": room }),
            ));
            return Ok(Outcome::Joined(room));
        }
        InboundEvent::ScrollSync { pos } => {
            if !connection.throttle.admit(Instant::now()) {
                counter!(WS_SCROLL_THROTTLED_TOTAL).increment(1);
                debug!("scroll throttled");
                return Ok(Outcome::Throttled);
            }
            ServerEvent::new(outbound::APPLY_SCROLL, json!(pos))
        }
        InboundEvent::ChangeSong { file_name } => ServerEvent::new(outbound::LOAD_SONG, file_name),
        InboundEvent::SyncFont { font_size } => ServerEvent::new(outbound::APPLY_FONT, font_size),
        InboundEvent::SyncTranspose { transpose_value } => {
            ServerEvent::new(outbound::APPLY_TRANSPOSE, transpose_value)
        }
        InboundEvent::SyncAutoscroll { active, speed } => ServerEvent::new(
            outbound::APPLY_AUTOSCROLL,
            json!({ "active": active, "speed": speed }),
        ),
    };

    let recipients = match ctx.realtime.broadcast_scope {
        BroadcastScope::Room => {
            ctx.registry
                .broadcast_room(&connection.room(), Some(&connection.id), &relay)
                .await
        }
        BroadcastScope::Global => ctx.registry.broadcast_all(Some(&connection.id), &relay).await,
    };
    debug!(event = name, recipients, "event relayed");
    Ok(Outcome::Relayed)
}
