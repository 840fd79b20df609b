//! End-to-end integration tests using real WebSocket and HTTP clients.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use setlist_server::SetlistServer;
use setlist_settings::{BroadcastScope, SetlistSettings};
use setlist_store::DirSongStore;

const TIMEOUT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(300);

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

struct TestServer {
    addr: SocketAddr,
    server: Arc<SetlistServer>,
    songs: TempDir,
}

impl TestServer {
    fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    fn http(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

/// Boot a server on an ephemeral port over a temporary songs directory.
async fn boot_server_with(configure: impl FnOnce(&mut SetlistSettings)) -> TestServer {
    let songs = tempfile::tempdir().unwrap();
    let mut settings = SetlistSettings::default();
    settings.server.host = "127.0.0.1".into();
    settings.server.port = 0;
    settings.storage.songs_dir = songs.path().to_path_buf();
    settings.storage.public_dir = songs.path().to_path_buf();
    configure(&mut settings);

    let store = DirSongStore::new(songs.path()).unwrap();
    let server = Arc::new(SetlistServer::new(Arc::new(settings), Arc::new(store)));
    let (addr, _handle) = server.listen().await.unwrap();
    TestServer {
        addr,
        server,
        songs,
    }
}

async fn boot_server() -> TestServer {
    boot_server_with(|_| {}).await
}

/// Connect and consume the `connected` greeting.
async fn connect(url: &str) -> (WsStream, Value) {
    let (mut ws, _) = connect_async(url).await.unwrap();
    let greeting = read_json(&mut ws).await;
    (ws, greeting)
}

/// Read the next text message as JSON.
async fn read_json(ws: &mut WsStream) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timeout waiting for message")
            .expect("stream closed")
            .expect("ws error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Assert nothing but control frames arrive for a short while.
async fn assert_silent(ws: &mut WsStream) {
    let deadline = tokio::time::Instant::now() + QUIET;
    loop {
        match tokio::time::timeout_at(deadline, ws.next()).await {
            Err(_) => return,
            Ok(Some(Ok(Message::Text(text)))) => panic!("unexpected message: {text}"),
            Ok(Some(Ok(_))) => {}
            Ok(other) => panic!("stream ended: {other:?}"),
        }
    }
}

async fn send(ws: &mut WsStream, frame: Value) {
    ws.send(Message::text(frame.to_string())).await.unwrap();
}

/// Send a frame with an ack id and read until that ack arrives.
async fn call(ws: &mut WsStream, id: &str, event: &str, payload: Value) -> Value {
    send(ws, json!({"id": id, "event": event, "payload": payload})).await;
    loop {
        let msg = read_json(ws).await;
        if msg.get("id").and_then(Value::as_str) == Some(id) {
            return msg;
        }
    }
}

/// Join a room, consuming the `session-joined` event and the ack.
async fn join(ws: &mut WsStream, room: &str) {
    send(
        ws,
        json!({"id": "join", "event": "join-session", "payload": {"sessionId": room}}),
    )
    .await;
    let joined = read_json(ws).await;
    assert_eq!(joined["type"], "session-joined");
    assert_eq!(joined["data"]["room"], room);
    let ack = read_json(ws).await;
    assert_eq!(ack, json!({"id": "join", "ok": true, "room": room}));
}

async fn wait_for_connections(server: &TestServer, expected: usize) {
    for _ in 0..50 {
        if server.server.registry().connection_count() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!(
        "expected {expected} connections, have {}",
        server.server.registry().connection_count()
    );
}

#[tokio::test]
async fn greeting_on_connect() {
    let srv = boot_server().await;
    let (_ws, greeting) = connect(&srv.ws_url()).await;
    assert_eq!(greeting["type"], "connected");
    assert_eq!(greeting["data"]["room"], "default");
    assert!(
        greeting["data"]["clientId"]
            .as_str()
            .unwrap()
            .starts_with("conn_")
    );
}

#[tokio::test]
async fn join_sanitizes_room_key() {
    let srv = boot_server().await;
    let (mut ws, _) = connect(&srv.ws_url()).await;
    let ack = call(&mut ws, "j1", "join-session", json!({"sessionId": "  band 1!!"})).await;
    assert_eq!(ack["room"], "band1");
}

#[tokio::test]
async fn sync_font_reaches_same_room_only() {
    let srv = boot_server().await;
    let (mut a, _) = connect(&srv.ws_url()).await;
    let (mut b, _) = connect(&srv.ws_url()).await;
    let (mut c, _) = connect(&srv.ws_url()).await;
    join(&mut a, "band1").await;
    join(&mut b, "band1").await;
    join(&mut c, "band2").await;

    let ack = call(
        &mut a,
        "f1",
        "sync-font",
        json!({"pin": "1234", "fontSize": 20}),
    )
    .await;
    assert_eq!(ack, json!({"id": "f1", "ok": true}));

    let got = read_json(&mut b).await;
    assert_eq!(got["type"], "apply-font");
    assert_eq!(got["data"], 20);
    assert_silent(&mut c).await;
    assert_silent(&mut a).await;
}

#[tokio::test]
async fn invalid_pin_over_socket() {
    let srv = boot_server().await;
    let (mut a, _) = connect(&srv.ws_url()).await;
    let (mut b, _) = connect(&srv.ws_url()).await;

    let ack = call(
        &mut a,
        "c1",
        "change-song",
        json!({"pin": "9999", "fileName": "a.pro"}),
    )
    .await;
    assert_eq!(ack, json!({"id": "c1", "ok": false, "error": "invalid pin"}));
    assert_silent(&mut b).await;
}

#[tokio::test]
async fn malformed_and_unknown_frames_keep_connection_open() {
    let srv = boot_server().await;
    let (mut ws, _) = connect(&srv.ws_url()).await;

    ws.send(Message::text("not json".to_string())).await.unwrap();
    let ack = call(&mut ws, "u1", "reboot", json!({})).await;
    assert_eq!(ack["error"], "unknown event");

    send(&mut ws, json!({"id": "m1", "payload": {}})).await;
    let ack = read_json(&mut ws).await;
    assert_eq!(ack, json!({"id": "m1", "ok": false, "error": "invalid frame"}));

    let ack = call(&mut ws, "j1", "join-session", json!("still-here")).await;
    assert_eq!(ack["room"], "still-here");
}

#[tokio::test]
async fn scroll_burst_is_throttled() {
    let srv = boot_server_with(|s| s.realtime.scroll_throttle_ms = 5_000).await;
    let (mut a, _) = connect(&srv.ws_url()).await;
    let (mut b, _) = connect(&srv.ws_url()).await;

    let first = call(&mut a, "s1", "scroll-sync", json!({"pin": "1234", "pos": -3})).await;
    assert_eq!(first["ok"], true);
    assert!(first.get("throttled").is_none());
    let got = read_json(&mut b).await;
    assert_eq!(got["type"], "apply-scroll");
    assert_eq!(got["data"], 0.0);

    let second = call(&mut a, "s2", "scroll-sync", json!({"pin": "1234", "pos": 0.4})).await;
    assert_eq!(second["throttled"], true);
    assert_silent(&mut b).await;
}

#[tokio::test]
async fn save_with_wrong_pin_leaves_file_unchanged() {
    let srv = boot_server().await;
    std::fs::write(srv.songs.path().join("a.pro"), "original").unwrap();

    let client = reqwest::Client::new();
    let resp = client
        .post(srv.http("/save-song"))
        .json(&json!({"fileName": "a.pro", "content": "changed", "pin": "0000"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
    assert_eq!(
        std::fs::read_to_string(srv.songs.path().join("a.pro")).unwrap(),
        "original"
    );
}

#[tokio::test]
async fn save_overwrites_and_notifies_room() {
    let srv = boot_server().await;
    std::fs::write(srv.songs.path().join("a.pro"), "original").unwrap();
    let (mut a, _) = connect(&srv.ws_url()).await;
    let (mut other, _) = connect(&srv.ws_url()).await;
    join(&mut a, "band1").await;
    join(&mut other, "band2").await;

    let client = reqwest::Client::new();
    let resp = client
        .post(srv.http("/save-song"))
        .json(&json!({
            "fileName": "a.pro",
            "content": "{title: New}",
            "pin": "1234",
            "sessionId": "band1",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
    assert_eq!(
        std::fs::read_to_string(srv.songs.path().join("a.pro")).unwrap(),
        "{title: New}"
    );

    let update = read_json(&mut a).await;
    assert_eq!(update["type"], "song-updated");
    assert_eq!(update["data"]["fileName"], "a.pro");
    assert!(update["data"]["timestamp"].as_i64().unwrap() > 0);
    assert_silent(&mut other).await;
}

#[tokio::test]
async fn global_scope_notifies_everyone() {
    let srv = boot_server_with(|s| s.realtime.broadcast_scope = BroadcastScope::Global).await;
    let (mut a, _) = connect(&srv.ws_url()).await;
    let (mut b, _) = connect(&srv.ws_url()).await;
    join(&mut b, "elsewhere").await;

    let resp = reqwest::Client::new()
        .post(srv.http("/save-song"))
        .json(&json!({"fileName": "g.cho", "content": "x", "pin": "1234"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(read_json(&mut a).await["type"], "song-updated");
    assert_eq!(read_json(&mut b).await["type"], "song-updated");
}

#[tokio::test]
async fn save_rejects_traversal() {
    let srv = boot_server().await;
    let resp = reqwest::Client::new()
        .post(srv.http("/save-song"))
        .json(&json!({"fileName": "../escape.pro", "content": "x", "pin": "1234"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(resp.text().await.unwrap(), "invalid filename");
    assert!(!srv.songs.path().parent().unwrap().join("escape.pro").exists());
}

#[tokio::test]
async fn list_and_read_songs() {
    let srv = boot_server().await;
    std::fs::write(srv.songs.path().join("b.pro"), "B").unwrap();
    std::fs::write(srv.songs.path().join("a.cho"), "A").unwrap();

    let resp = reqwest::get(srv.http("/list-songs")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["cache-control"], "no-store");
    let names: Vec<String> = resp.json().await.unwrap();
    assert_eq!(names, vec!["a.cho", "b.pro"]);

    let resp = reqwest::get(srv.http("/song/a.cho")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "A");
}

#[tokio::test]
async fn health_tracks_connections() {
    let srv = boot_server().await;
    let (mut ws, _) = connect(&srv.ws_url()).await;
    join(&mut ws, "band1").await;

    let health: Value = reqwest::get(srv.http("/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["connections"], 1);
    assert_eq!(health["rooms"], 1);

    ws.close(None).await.unwrap();
    wait_for_connections(&srv, 0).await;
}

#[tokio::test]
async fn disconnects_racing_broadcast_do_not_fault() {
    let srv = boot_server_with(|s| s.realtime.require_pin_for_sync = false).await;
    let (mut leader, _) = connect(&srv.ws_url()).await;
    join(&mut leader, "band1").await;

    let mut stayers = Vec::new();
    let mut leavers = Vec::new();
    for i in 0..8 {
        let (mut ws, _) = connect(&srv.ws_url()).await;
        join(&mut ws, "band1").await;
        if i % 2 == 0 {
            stayers.push(ws);
        } else {
            leavers.push(ws);
        }
    }
    wait_for_connections(&srv, 9).await;

    let closing = tokio::spawn(async move {
        for mut ws in leavers {
            let _ = ws.close(None).await;
        }
    });
    for i in 0..5 {
        send(
            &mut leader,
            json!({"event": "sync-transpose", "payload": {"transposeValue": i}}),
        )
        .await;
    }
    closing.await.unwrap();

    for ws in &mut stayers {
        for i in 0..5 {
            let got = read_json(ws).await;
            assert_eq!(got["type"], "apply-transpose");
            assert_eq!(got["data"], i);
        }
    }
    wait_for_connections(&srv, 5).await;
}

#[tokio::test]
async fn shutdown_stops_serving() {
    let srv = boot_server().await;
    let (addr, handle) = srv.server.listen().await.unwrap();
    srv.server.shutdown().trigger();
    timeout(TIMEOUT, handle)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(
        reqwest::get(format!("http://{addr}/health"))
            .await
            .is_err()
    );
}

#[tokio::test]
async fn drain_closes_open_sessions() {
    let srv = boot_server().await;
    let (mut ws, _) = connect(&srv.ws_url()).await;
    wait_for_connections(&srv, 1).await;
    assert_eq!(srv.server.shutdown().live_sessions(), 1);

    let (_addr, handle) = srv.server.listen().await.unwrap();
    assert!(srv.server.shutdown().drain(handle, Some(TIMEOUT)).await);

    let closed = timeout(TIMEOUT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "client was not closed");
    assert_eq!(srv.server.registry().connection_count(), 0);
}

#[tokio::test]
async fn idle_client_survives_short_heartbeat_timeout() {
    let srv = boot_server_with(|s| {
        s.server.heartbeat_interval_secs = 1;
        s.server.heartbeat_timeout_secs = 0;
    })
    .await;
    let (mut ws, _) = connect(&srv.ws_url()).await;

    // Keep polling so tungstenite answers pings with pongs.
    let mut pings = 0;
    let deadline = tokio::time::Instant::now() + Duration::from_millis(2_500);
    loop {
        match tokio::time::timeout_at(deadline, ws.next()).await {
            Err(_) => break,
            Ok(Some(Ok(Message::Ping(_)))) => pings += 1,
            Ok(Some(Ok(Message::Text(text)))) => panic!("unexpected message: {text}"),
            Ok(Some(Ok(_))) => {}
            Ok(other) => panic!("idle client was disconnected: {other:?}"),
        }
    }
    assert!(pings >= 1, "no ping received");
    assert_eq!(srv.server.registry().connection_count(), 1);
}
