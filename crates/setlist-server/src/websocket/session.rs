//! WebSocket session lifecycle: handles a single connected client from
//! upgrade through disconnect.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use serde_json::json;
use setlist_core::{ConnectionId, DEFAULT_SESSION_KEY};
use setlist_settings::SetlistSettings;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::ClientConnection;
use super::handler::{SyncContext, handle_message};
use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL};
use crate::protocol::{ServerEvent, outbound};

/// How long the writer gets to flush the close frame.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Per-connection limits and timings.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Interval between server-initiated Ping frames.
    pub ping_interval: Duration,
    /// How long a client may stay silent before it is disconnected.
    pub pong_timeout: Duration,
    /// Outbound queue capacity.
    pub send_queue_capacity: usize,
    /// Scroll throttle window.
    pub scroll_window: Duration,
}

impl SessionConfig {
    /// Derive from loaded settings.
    ///
    /// The pong timeout is kept at least one second above the ping interval
    /// so an idle client always gets a ping before it can go stale.
    pub fn from_settings(settings: &SetlistSettings) -> Self {
        let ping_interval = Duration::from_secs(settings.server.heartbeat_interval_secs.max(1));
        let pong_floor = ping_interval + Duration::from_secs(1);
        Self {
            ping_interval,
            pong_timeout: Duration::from_secs(settings.server.heartbeat_timeout_secs).max(pong_floor),
            send_queue_capacity: settings.server.send_queue_capacity.max(1),
            scroll_window: Duration::from_millis(settings.realtime.scroll_throttle_ms),
        }
    }
}

/// The greeting sent on connect.
pub fn connected_event(client_id: &ConnectionId) -> ServerEvent {
    ServerEvent::new(
        outbound::CONNECTED,
        json!({ "clientId": client_id, "room": DEFAULT_SESSION_KEY }),
    )
}

/// Run a WebSocket session for a connected client.
///
/// 1. Registers the connection in the default room and sends `connected`
/// 2. Dispatches incoming text frames and queues their acks
/// 3. Forwards queued events to the socket and pings on an interval
/// 4. Ends on close, socket error, heartbeat timeout, eviction or shutdown
/// 5. Removes the connection from the registry exactly once
#[instrument(skip_all, fields(client_id = %client_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    client_id: ConnectionId,
    ctx: Arc<SyncContext>,
    config: SessionConfig,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(config.send_queue_capacity);
    let connection = Arc::new(ClientConnection::new(
        client_id.clone(),
        send_tx,
        config.scroll_window,
    ));

    let connection_start = Instant::now();
    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    ctx.registry.add(connection.clone()).await;

    if let Some(json) = connected_event(&client_id).to_json() {
        let _ = ws_tx.send(Message::Text(json.to_string().into())).await;
    }

    let outbound_conn = connection.clone();
    let ping_interval = config.ping_interval;
    let pong_timeout = config.pong_timeout;
    let mut outbound = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ping_interval);
        // Skip the immediate first tick
        let _ = ticker.tick().await;

        loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    let Some(text) = msg else { break };
                    if ws_tx.send(Message::Text(text.to_string().into())).await.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if outbound_conn.is_stale(pong_timeout) {
                        warn!(timeout = ?pong_timeout, "client unresponsive, disconnecting");
                        break;
                    }
                    if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
                () = outbound_conn.closed() => break,
            }
        }
        let _ = ws_tx.send(Message::Close(None)).await;
        outbound_conn.close();
    });

    loop {
        let msg = tokio::select! {
            msg = ws_rx.next() => msg,
            () = connection.closed() => {
                debug!("connection closed by server");
                break;
            }
            () = shutdown.cancelled() => {
                debug!("server shutting down");
                break;
            }
        };
        let Some(Ok(msg)) = msg else { break };
        connection.touch();

        let text = match msg {
            Message::Text(ref t) => t.to_string(),
            Message::Binary(ref data) => {
                if let Ok(s) = std::str::from_utf8(data) {
                    s.to_string()
                } else {
                    debug!(len = data.len(), "received non-UTF8 binary frame");
                    continue;
                }
            }
            Message::Close(_) => {
                info!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        if let Some(ack) = handle_message(&text, &connection, &ctx).await {
            if let Some(json) = ack.to_json() {
                if !connection.enqueue(json) {
                    debug!("failed to enqueue ack (channel full or closed)");
                }
            }
        }
    }

    connection.close();
    let removed = ctx.registry.remove(&client_id).await;
    if tokio::time::timeout(CLOSE_GRACE, &mut outbound).await.is_err() {
        outbound.abort();
    }
    info!(
        removed,
        room = connection.room(),
        duration_secs = connection_start.elapsed().as_secs(),
        "client disconnected"
    );
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
}
