//! `/health` endpoint body.

use std::time::Instant;

use serde::Serialize;

use crate::websocket::rooms::RoomRegistry;

/// Liveness snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `"ok"` while serving, `"draining"` once shutdown has started.
    pub status: &'static str,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Registered WebSocket participants.
    pub connections: usize,
    /// Rooms with at least one participant.
    pub rooms: usize,
}

impl HealthResponse {
    /// Read live counters from the registry.
    pub async fn collect(started: Instant, registry: &RoomRegistry, draining: bool) -> Self {
        Self {
            status: if draining { "draining" } else { "ok" },
            uptime_secs: started.elapsed().as_secs(),
            connections: registry.connection_count(),
            rooms: registry.room_count().await,
        }
    }
}
