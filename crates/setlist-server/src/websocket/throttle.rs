//! Per-connection scroll throttle.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Drops scroll events arriving within `window` of the last admitted one.
///
/// Dropped events do not move the window.
#[derive(Debug)]
pub struct ScrollThrottle {
    window: Duration,
    last: Mutex<Option<Instant>>,
}

impl ScrollThrottle {
    /// Create a throttle with the given window.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last: Mutex::new(None),
        }
    }

    /// Whether an event at `now` may pass. Records `now` when it does.
    pub fn admit(&self, now: Instant) -> bool {
        let mut last = self.last.lock();
        if let Some(prev) = *last {
            if now.saturating_duration_since(prev) < self.window {
                return false;
            }
        }
        *last = Some(now);
        true
    }

    /// The configured window.
    pub fn window(&self) -> Duration {
        self.window
    }
}
