//! `SetlistServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use setlist_core::ConnectionId;
use setlist_settings::SetlistSettings;
use setlist_store::SongStore;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::auth::PinGate;
use crate::health::HealthResponse;
use crate::http::songs;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::handler::SyncContext;
use crate::websocket::rooms::RoomRegistry;
use crate::websocket::session::{SessionConfig, run_ws_session};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Loaded settings.
    pub settings: Arc<SetlistSettings>,
    /// Chart storage.
    pub store: Arc<dyn SongStore>,
    /// Registry, PIN gate and realtime options.
    pub sync: Arc<SyncContext>,
    /// Per-connection limits.
    pub session_config: SessionConfig,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The Setlist server.
pub struct SetlistServer {
    state: AppState,
}

impl SetlistServer {
    /// Create a server over `store` with the given settings.
    pub fn new(settings: Arc<SetlistSettings>, store: Arc<dyn SongStore>) -> Self {
        let sync = Arc::new(SyncContext {
            registry: Arc::new(RoomRegistry::new()),
            gate: PinGate::new(settings.leader_pin.clone()),
            realtime: settings.realtime.clone(),
        });
        let state = AppState {
            session_config: SessionConfig::from_settings(&settings),
            settings,
            store,
            sync,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            metrics: None,
        };
        Self { state }
    }

    /// Serve `/metrics` from this handle.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.state.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let public_dir = ServeDir::new(&self.state.settings.storage.public_dir);
        Router::new()
            .route("/list-songs", get(songs::list_songs))
            .route("/save-song", post(songs::save_song))
            .route("/song/{file_name}", get(songs::get_song))
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .fallback_service(public_dir)
            .with_state(self.state.clone())
            .layer(SetResponseHeaderLayer::overriding(
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-store"),
            ))
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let server = &self.state.settings.server;
        let listener = TcpListener::bind((server.host.as_str(), server.port)).await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "setlist server listening");

        let router = self.router();
        let token = self.state.shutdown.token();
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "server error");
            }
        });
        Ok((local_addr, handle))
    }

    /// Room registry.
    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.state.sync.registry
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.state.shutdown
    }

    /// Loaded settings.
    pub fn settings(&self) -> &SetlistSettings {
        &self.state.settings
    }
}

/// GET /ws
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let client_id = ConnectionId::new();
    ws.max_message_size(state.settings.server.max_message_size)
        .on_upgrade(move |socket| {
            state.shutdown.track(run_ws_session(
                socket,
                client_id,
                state.sync.clone(),
                state.session_config.clone(),
                state.shutdown.token(),
            ))
        })
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(
        HealthResponse::collect(
            state.start_time,
            &state.sync.registry,
            state.shutdown.is_triggered(),
        )
        .await,
    )
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}
