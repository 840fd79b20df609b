//! WebSocket realtime channel.

pub mod connection;
pub mod handler;
pub mod rooms;
pub mod session;
pub mod throttle;
