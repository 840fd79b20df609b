//! # setlist-server
//!
//! Axum HTTP + WebSocket server: chart endpoints, the realtime broadcast core,
//! health, metrics and shutdown plumbing.

#![deny(unsafe_code)]

pub mod auth;
pub mod errors;
pub mod health;
pub mod http;
pub mod metrics;
pub mod protocol;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use server::{AppState, SetlistServer};
