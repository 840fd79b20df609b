//! Prometheus metrics: names, descriptions, recorder install, rendering.
//!
//! Metrics are recorded through the `metrics` facade everywhere; without an
//! installed recorder they are no-ops, which is what tests run with.

use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Sockets accepted.
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// Sockets closed.
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Participants currently registered.
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Events relayed, labelled by `event`.
pub const WS_EVENTS_TOTAL: &str = "ws_events_total";
/// Events refused, labelled by `event` and `reason`.
pub const WS_EVENTS_REJECTED_TOTAL: &str = "ws_events_rejected_total";
/// Scroll events dropped by the per-participant throttle.
pub const WS_SCROLL_THROTTLED_TOTAL: &str = "ws_scroll_throttled_total";
/// Frames dropped on full or closed outbound queues.
pub const WS_BROADCAST_DROPS_TOTAL: &str = "ws_broadcast_drops_total";
/// Charts written through `/save-song`.
pub const SONGS_SAVED_TOTAL: &str = "songs_saved_total";

/// Install the global Prometheus recorder and register metric help text.
///
/// Fails if a recorder is already installed in this process.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe();
    info!("prometheus recorder installed");
    Ok(handle)
}

fn describe() {
    describe_counter!(WS_CONNECTIONS_TOTAL, "WebSocket connections accepted");
    describe_counter!(WS_DISCONNECTIONS_TOTAL, "WebSocket connections closed");
    describe_gauge!(WS_CONNECTIONS_ACTIVE, "Participants currently connected");
    describe_counter!(WS_EVENTS_TOTAL, "Sync events relayed by event name");
    describe_counter!(WS_EVENTS_REJECTED_TOTAL, "Sync events refused by event name and reason");
    describe_counter!(WS_SCROLL_THROTTLED_TOTAL, "Scroll events dropped by the throttle");
    describe_counter!(WS_BROADCAST_DROPS_TOTAL, "Outbound frames dropped on full queues");
    describe_counter!(SONGS_SAVED_TOTAL, "Charts saved");
}

/// Prometheus text exposition.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}
