//! Store error types.

use std::io;

use thiserror::Error;

/// Errors returned by [`crate::SongStore`] operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The name failed validation before any I/O happened.
    #[error("invalid song name: {name}")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// The composed path resolved outside the storage root.
    #[error("path escapes storage root: {path}")]
    PathEscape {
        /// The offending composed path.
        path: String,
    },

    /// No chart with that name exists.
    #[error("song not found: {name}")]
    NotFound {
        /// The missing name.
        name: String,
    },

    /// Underlying read/write failure.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
