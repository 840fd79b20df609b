//! Per-participant state shared between the session task and the registry.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use setlist_core::{ConnectionId, DEFAULT_SESSION_KEY};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::throttle::ScrollThrottle;
use crate::protocol::ServerEvent;

/// One connected participant.
///
/// Outbound frames go through a bounded queue drained by the session's
/// writer task; producers never wait on it.
pub struct ClientConnection {
    /// Connection id, also sent to the client in the greeting.
    pub id: ConnectionId,
    /// Scroll rate limiter for this participant.
    pub throttle: ScrollThrottle,
    room: Mutex<String>,
    outbox: mpsc::Sender<Arc<String>>,
    last_seen: Mutex<Instant>,
    dropped: AtomicU64,
    closed: CancellationToken,
}

impl ClientConnection {
    /// A participant in the `"default"` room.
    pub fn new(id: ConnectionId, outbox: mpsc::Sender<Arc<String>>, scroll_window: Duration) -> Self {
        Self {
            id,
            throttle: ScrollThrottle::new(scroll_window),
            room: Mutex::new(DEFAULT_SESSION_KEY.to_string()),
            outbox,
            last_seen: Mutex::new(Instant::now()),
            dropped: AtomicU64::new(0),
            closed: CancellationToken::new(),
        }
    }

    /// Current room key.
    pub fn room(&self) -> String {
        self.room.lock().clone()
    }

    // Only the registry moves participants, under its own lock.
    pub(crate) fn set_room(&self, room: &str) {
        *self.room.lock() = room.to_string();
    }

    /// Queue a serialized frame without waiting.
    ///
    /// A full or closed queue counts as a drop and returns `false`.
    pub fn enqueue(&self, frame: Arc<String>) -> bool {
        let queued = self.outbox.try_send(frame).is_ok();
        if !queued {
            let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        queued
    }

    /// Serialize and queue a server event.
    pub fn push(&self, event: &ServerEvent) -> bool {
        event.to_json().is_some_and(|frame| self.enqueue(frame))
    }

    /// Frames dropped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Record inbound traffic (any frame, including pongs).
    pub fn touch(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    /// Silent for longer than `timeout`.
    pub fn is_stale(&self, timeout: Duration) -> bool {
        self.last_seen.lock().elapsed() > timeout
    }

    /// Ask the session to hang up.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Whether [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the connection is closed.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }
}
