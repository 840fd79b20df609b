//! Room membership and event fan-out.
//!
//! The connection table and the room index share one lock, so join, remove
//! and recipient snapshots never observe each other half-done. Sends happen
//! after the lock is released.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use metrics::counter;
use setlist_core::{ConnectionId, DEFAULT_SESSION_KEY, sanitize_session_key};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::connection::ClientConnection;
use crate::metrics::WS_BROADCAST_DROPS_TOTAL;
use crate::protocol::ServerEvent;

/// Maximum total lifetime message drops before forcibly disconnecting a slow client.
pub const MAX_TOTAL_DROPS: u64 = 100;

#[derive(Default)]
struct Rooms {
    connections: HashMap<ConnectionId, Arc<ClientConnection>>,
    members: HashMap<String, HashSet<ConnectionId>>,
}

impl Rooms {
    fn enter(&mut self, conn: &ClientConnection, room: &str) {
        let _ = self
            .members
            .entry(room.to_string())
            .or_default()
            .insert(conn.id.clone());
        conn.set_room(room);
    }

    fn leave(&mut self, id: &ConnectionId, room: &str) {
        if let Some(set) = self.members.get_mut(room) {
            let _ = set.remove(id);
            if set.is_empty() {
                let _ = self.members.remove(room);
            }
        }
    }
}

/// Tracks connected participants and the room each one is in.
pub struct RoomRegistry {
    inner: RwLock<Rooms>,
    /// Connection count readable without taking the lock.
    active_count: AtomicUsize,
}

impl RoomRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Rooms::default()),
            active_count: AtomicUsize::new(0),
        }
    }

    /// Register a connection in the default room.
    pub async fn add(&self, connection: Arc<ClientConnection>) {
        let mut rooms = self.inner.write().await;
        match rooms
            .connections
            .insert(connection.id.clone(), connection.clone())
        {
            Some(previous) => rooms.leave(&previous.id, &previous.room()),
            None => {
                let _ = self.active_count.fetch_add(1, Ordering::Relaxed);
            }
        }
        rooms.enter(&connection, DEFAULT_SESSION_KEY);
    }

    /// Move a connection into the room named by `raw` (sanitized first).
    ///
    /// Leaves the previous room, dropping it when empty. Returns the resolved
    /// room key. A connection that was already removed is not re-added.
    pub async fn join(&self, connection: &ClientConnection, raw: &str) -> String {
        let room = sanitize_session_key(raw);
        let mut rooms = self.inner.write().await;
        if !rooms.connections.contains_key(&connection.id) {
            return room;
        }
        let previous = connection.room();
        if previous != room {
            rooms.leave(&connection.id, &previous);
        }
        rooms.enter(connection, &room);
        info!(conn_id = %connection.id, from = previous, room, "joined session");
        room
    }

    /// Remove a connection. Returns `false` if it was already gone.
    pub async fn remove(&self, connection_id: &ConnectionId) -> bool {
        let mut rooms = self.inner.write().await;
        let Some(connection) = rooms.connections.remove(connection_id) else {
            return false;
        };
        rooms.leave(connection_id, &connection.room());
        let _ = self.active_count.fetch_sub(1, Ordering::Relaxed);
        true
    }

    /// Send an event to every member of `room` except `exclude`.
    ///
    /// Returns the number of connections the event was queued for.
    pub async fn broadcast_room(
        &self,
        room: &str,
        exclude: Option<&ConnectionId>,
        event: &ServerEvent,
    ) -> usize {
        let recipients: Vec<Arc<ClientConnection>> = {
            let rooms = self.inner.read().await;
            rooms
                .members
                .get(room)
                .into_iter()
                .flatten()
                .filter(|id| Some(*id) != exclude)
                .filter_map(|id| rooms.connections.get(id).cloned())
                .collect()
        };
        self.deliver(&recipients, event, room).await
    }

    /// Send an event to every connection except `exclude`.
    pub async fn broadcast_all(&self, exclude: Option<&ConnectionId>, event: &ServerEvent) -> usize {
        let recipients: Vec<Arc<ClientConnection>> = {
            let rooms = self.inner.read().await;
            rooms
                .connections
                .values()
                .filter(|c| Some(&c.id) != exclude)
                .cloned()
                .collect()
        };
        self.deliver(&recipients, event, "all").await
    }

    /// Fan out to a recipient snapshot, evicting clients past the drop limit.
    async fn deliver(
        &self,
        recipients: &[Arc<ClientConnection>],
        event: &ServerEvent,
        label: &str,
    ) -> usize {
        let Some(json) = event.to_json() else {
            return 0;
        };
        let mut delivered = 0;
        let mut to_evict = Vec::new();
        for conn in recipients {
            if conn.enqueue(Arc::clone(&json)) {
                delivered += 1;
                continue;
            }
            counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
            let drops = conn.dropped();
            if drops >= MAX_TOTAL_DROPS {
                warn!(conn_id = %conn.id, label, drops, "disconnecting slow client");
                to_evict.push(Arc::clone(conn));
            } else {
                warn!(conn_id = %conn.id, label, total_drops = drops, "failed to send event to client (channel full)");
            }
        }
        debug!(
            event_type = event.event_type,
            label,
            recipients = recipients.len(),
            delivered,
            "broadcast event"
        );
        for conn in to_evict {
            if self.remove(&conn.id).await {
                conn.close();
            }
        }
        delivered
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }

    /// Number of non-empty rooms.
    pub async fn room_count(&self) -> usize {
        self.inner.read().await.members.len()
    }

    /// Ids of the members of `room`.
    pub async fn members(&self, room: &str) -> Vec<ConnectionId> {
        self.inner
            .read()
            .await
            .members
            .get(room)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether a connection is registered.
    pub async fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.inner
            .read()
            .await
            .connections
            .contains_key(connection_id)
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}
