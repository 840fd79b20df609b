//! Realtime event errors.
//!
//! Every variant is recovered at the event boundary into a negative ack; none
//! closes the connection.

use thiserror::Error;

/// Why an inbound socket event was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The supplied PIN did not match the leader PIN.
    #[error("invalid pin")]
    InvalidPin,
    /// The frame was not a JSON object with an `event` string.
    #[error("invalid frame")]
    InvalidFrame,
    /// The event name is not part of the protocol.
    #[error("unknown event")]
    UnknownEvent,
}

impl SyncError {
    /// Metric label for this rejection.
    pub fn reason(self) -> &'static str {
        match self {
            Self::InvalidPin => "invalid_pin",
            Self::InvalidFrame => "invalid_frame",
            Self::UnknownEvent => "unknown_event",
        }
    }
}
