//! Process shutdown: one cancellation token plus a tracker for live sessions.
//!
//! The listener and every WebSocket session watch the same token. Sessions
//! are spawned through [`ShutdownCoordinator::track`] so [`drain`] can wait
//! for them to send their close frames before the process exits.
//!
//! [`drain`]: ShutdownCoordinator::drain

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tokio_util::task::task_tracker::TrackedFuture;
use tracing::{info, warn};

/// Grace period used by [`ShutdownCoordinator::drain`] when none is given.
pub const DEFAULT_DRAIN_GRACE: Duration = Duration::from_secs(10);

/// Shared stop signal for the listener and all sessions.
#[derive(Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    sessions: TaskTracker,
}

impl ShutdownCoordinator {
    /// Create a coordinator that has not been triggered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token cancelled when shutdown starts.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Start shutdown. Idempotent.
    pub fn trigger(&self) {
        if !self.token.is_cancelled() {
            info!(sessions = self.sessions.len(), "shutdown requested");
        }
        self.token.cancel();
    }

    /// Whether [`trigger`](Self::trigger) has been called.
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wrap a session future so [`drain`](Self::drain) waits for it.
    pub fn track<F: Future>(&self, session: F) -> TrackedFuture<F> {
        self.sessions.track_future(session)
    }

    /// Number of tracked sessions still running.
    pub fn live_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Trigger shutdown, then wait for the listener task and every tracked
    /// session, giving up after `grace`.
    ///
    /// Returns `true` when everything finished in time.
    pub async fn drain(&self, listener: JoinHandle<()>, grace: Option<Duration>) -> bool {
        let grace = grace.unwrap_or(DEFAULT_DRAIN_GRACE);
        self.trigger();
        let _ = self.sessions.close();

        let all_done = async {
            let _ = listener.await;
            self.sessions.wait().await;
        };
        match tokio::time::timeout(grace, all_done).await {
            Ok(()) => {
                info!("shutdown complete");
                true
            }
            Err(_) => {
                warn!(
                    grace_ms = grace.as_millis(),
                    sessions = self.sessions.len(),
                    "shutdown grace elapsed with sessions still open"
                );
                false
            }
        }
    }
}
