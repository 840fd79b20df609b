//! # setlist-store
//!
//! Chart file storage: a flat directory of `.pro` / `.cho` files.
//!
//! - [`names`]: the song-name predicate and path containment check
//! - [`store`]: the [`SongStore`] seam and its directory-backed implementation
//! - [`errors`]: [`StoreError`]

#![deny(unsafe_code)]

pub mod errors;
pub mod names;
pub mod store;

pub use errors::StoreError;
pub use names::{MAX_SONG_NAME_LEN, is_valid_song_name};
pub use store::{DirSongStore, SongStore};
