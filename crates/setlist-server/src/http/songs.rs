//! Chart endpoints: list, read, and PIN-gated save.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use metrics::counter;
use serde_json::{Value, json};
use setlist_core::session_key::sanitize_session_value;
use setlist_settings::BroadcastScope;
use setlist_store::StoreError;
use tracing::{error, info, warn};

use crate::metrics::SONGS_SAVED_TOTAL;
use crate::protocol::{ServerEvent, outbound};
use crate::server::AppState;

/// Status and plain-text body for a store failure.
pub fn store_error_status(err: &StoreError) -> (StatusCode, &'static str) {
    match err {
        StoreError::InvalidName { .. } => (StatusCode::BAD_REQUEST, "invalid filename"),
        StoreError::PathEscape { .. } => (StatusCode::BAD_REQUEST, "invalid path"),
        StoreError::NotFound { .. } => (StatusCode::NOT_FOUND, "not found"),
        StoreError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "error"),
    }
}

/// Text written for a save request's `content` field.
fn content_text(content: Option<&Value>) -> String {
    match content {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Lenient JSON body: anything unparseable reads as having no fields.
fn request_json(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap_or(Value::Null)
}

/// GET /list-songs
pub async fn list_songs(State(state): State<AppState>) -> Response {
    match state.store.list_songs().await {
        Ok(names) => Json(names).into_response(),
        Err(e) => {
            warn!(error = %e, "failed to list songs");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(Vec::<String>::new())).into_response()
        }
    }
}

/// GET /song/{file_name}
pub async fn get_song(State(state): State<AppState>, Path(file_name): Path<String>) -> Response {
    match state.store.read(&file_name).await {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            text,
        )
            .into_response(),
        Err(e) => {
            if matches!(e, StoreError::Io(_)) {
                error!(song = file_name, error = %e, "failed to read song");
            }
            store_error_status(&e).into_response()
        }
    }
}

/// POST /save-song
///
/// Body: `{fileName, content, pin, sessionId?}`. The PIN is checked before
/// anything else, including the content type: a body that is not JSON reads
/// as empty and fails the PIN check. On success every participant in the
/// target room (or everyone, with global scope) gets `song-updated`.
pub async fn save_song(State(state): State<AppState>, body: Bytes) -> Response {
    let body = request_json(&body);
    if !state.sync.gate.check(body.get("pin")) {
        warn!("save rejected: invalid pin");
        return (StatusCode::FORBIDDEN, "invalid pin").into_response();
    }
    let Some(file_name) = body.get("fileName").and_then(Value::as_str) else {
        return (StatusCode::BAD_REQUEST, "invalid filename").into_response();
    };
    let content = content_text(body.get("content"));

    if let Err(e) = state.store.save(file_name, Some(&content)).await {
        if matches!(e, StoreError::Io(_)) {
            error!(song = file_name, error = %e, "failed to save song");
        } else {
            warn!(song = file_name, error = %e, "save rejected");
        }
        return store_error_status(&e).into_response();
    }
    counter!(SONGS_SAVED_TOTAL).increment(1);

    let event = ServerEvent::new(
        outbound::SONG_UPDATED,
        json!({
            "fileName": file_name,
            "timestamp": chrono::Utc::now().timestamp_millis(),
        }),
    );
    let recipients = match state.sync.realtime.broadcast_scope {
        BroadcastScope::Room => {
            let room = sanitize_session_value(body.get("sessionId"));
            state.sync.registry.broadcast_room(&room, None, &event).await
        }
        BroadcastScope::Global => state.sync.registry.broadcast_all(None, &event).await,
    };
    info!(song = file_name, bytes = content.len(), recipients, "song saved");

    (StatusCode::OK, "OK").into_response()
}
