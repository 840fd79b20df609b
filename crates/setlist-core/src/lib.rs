//! # setlist-core
//!
//! Foundation pieces shared by every Setlist crate:
//!
//! - [`session_key`]: the single function that turns client input into a room key
//! - [`payload`]: lenient coercion of loosely-typed client payload fields
//! - [`ids`]: connection identifiers
//! - [`logging`]: `tracing` subscriber setup

#![deny(unsafe_code)]

pub mod ids;
pub mod logging;
pub mod payload;
pub mod session_key;

pub use ids::ConnectionId;
pub use session_key::{DEFAULT_SESSION_KEY, MAX_SESSION_KEY_LEN, sanitize_session_key};
