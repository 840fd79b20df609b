//! Plain HTTP routes.

pub mod songs;
