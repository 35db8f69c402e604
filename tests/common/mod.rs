//! In-process mock chat backend and session helpers.
#![allow(dead_code, clippy::panic)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Multipart, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde_json::{Value, json};
use tokio::sync::broadcast;

use chat_session::auth::MemoryCredentialStore;
use chat_session::config::ClientConfig;
use chat_session::domain::SessionEvent;
use chat_session::service::{SessionService, SessionSnapshot};

pub const TOKEN: &str = "secret-token";

/// How the mock answers each user frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// `typing`, then `message` echoing the content.
    Echo,
    /// Never answers.
    Silent,
    /// `{"error": "boom"}`.
    ErrorReply,
    /// A non-JSON text frame.
    Malformed,
    /// Closes the socket.
    Close,
}

/// What the mock saw of an upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadRecord {
    pub file_name: Option<String>,
    pub size: usize,
    pub chat_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MockBackend {
    pub script: Script,
    pub chats: Arc<Mutex<Value>>,
    pub fail_chats: bool,
    pub fail_upload: bool,
    pub frames: Arc<Mutex<Vec<Value>>>,
    pub uploads: Arc<Mutex<Vec<UploadRecord>>>,
}

impl MockBackend {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            chats: Arc::new(Mutex::new(json!([
                {"id": 7, "title": "Seven", "messages": [
                    {"role": "user", "content": "a"},
                    {"role": "bot", "content": "b"}
                ]},
                {"id": "x", "messages": null}
            ]))),
            fail_chats: false,
            fail_upload: false,
            frames: Arc::new(Mutex::new(Vec::new())),
            uploads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Replaces what `/chats` returns from now on.
    pub fn set_chats(&self, chats: Value) {
        if let Ok(mut current) = self.chats.lock() {
            *current = chats;
        }
    }

    pub fn frames(&self) -> Vec<Value> {
        self.frames.lock().map(|f| f.clone()).unwrap_or_default()
    }

    pub fn uploads(&self) -> Vec<UploadRecord> {
        self.uploads.lock().map(|u| u.clone()).unwrap_or_default()
    }

    /// Serves the mock on an ephemeral port.
    pub async fn spawn(&self) -> SocketAddr {
        let app = Router::new()
            .route("/ws", get(ws_route))
            .route("/chats", get(chats_route))
            .route("/upload", post(upload_route))
            .with_state(self.clone());
        let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
            panic!("bind failed");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("no local addr");
        };
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        addr
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(format!("Bearer {TOKEN}").as_str())
}

async fn ws_route(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    State(backend): State<MockBackend>,
) -> Response {
    if params.get("token").map(String::as_str) != Some(TOKEN) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    ws.on_upgrade(move |socket| serve_socket(socket, backend))
}

async fn serve_socket(mut socket: WebSocket, backend: MockBackend) {
    while let Some(Ok(msg)) = socket.recv().await {
        let text = match msg {
            WsMessage::Text(text) => text.as_str().to_string(),
            WsMessage::Close(_) => break,
            _ => continue,
        };
        let frame: Value = serde_json::from_str(&text).unwrap_or_default();
        let content = frame
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if let Ok(mut frames) = backend.frames.lock() {
            frames.push(frame);
        }

        let replies: Vec<String> = match backend.script {
            Script::Echo => vec![
                json!({"type": "typing"}).to_string(),
                json!({"type": "message", "from": "bot", "content": format!("echo: {content}")})
                    .to_string(),
            ],
            Script::Silent => Vec::new(),
            Script::ErrorReply => vec![json!({"error": "boom"}).to_string()],
            Script::Malformed => vec!["not valid json".to_string()],
            Script::Close => {
                let _ = socket.send(WsMessage::Close(None)).await;
                break;
            }
        };
        for reply in replies {
            if socket.send(WsMessage::text(reply)).await.is_err() {
                return;
            }
        }
    }
}

async fn chats_route(State(backend): State<MockBackend>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if backend.fail_chats {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let chats = backend
        .chats
        .lock()
        .map(|c| c.clone())
        .unwrap_or_default();
    axum::Json(chats).into_response()
}

async fn upload_route(
    State(backend): State<MockBackend>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let mut record = UploadRecord::default();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                record.file_name = field.file_name().map(str::to_string);
                record.size = field.bytes().await.map(|b| b.len()).unwrap_or_default();
            }
            Some("chat_id") => record.chat_id = field.text().await.ok(),
            _ => {}
        }
    }
    if backend.fail_upload {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let filename = record.file_name.clone().unwrap_or_default();
    if let Ok(mut uploads) = backend.uploads.lock() {
        uploads.push(record);
    }
    axum::Json(json!({ "filename": filename })).into_response()
}

/// Config pointing at `addr` with a generous reply timeout.
pub fn config(addr: SocketAddr) -> ClientConfig {
    let Ok(config) = ClientConfig::new(&format!("http://{addr}")) else {
        panic!("mock base must parse");
    };
    config
        .with_token(TOKEN)
        .with_reply_timeout(Some(Duration::from_secs(30)))
}

pub fn start(config: &ClientConfig, token: &str) -> SessionService {
    let credentials = Arc::new(MemoryCredentialStore::new(Some(token.to_string())));
    match SessionService::start(config, credentials) {
        Ok(session) => session,
        Err(err) => panic!("session failed to start: {err}"),
    }
}

/// Polls snapshots until `pred` holds (5 s budget).
pub async fn wait_until(
    session: &SessionService,
    what: &str,
    pred: impl Fn(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let snapshot = match session.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(err) => panic!("snapshot failed while waiting for {what}: {err}"),
        };
        if pred(&snapshot) {
            return snapshot;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}; last snapshot: {snapshot:?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Waits for an open connection and a loaded listing.
pub async fn wait_ready(session: &SessionService) -> SessionSnapshot {
    wait_until(session, "open connection and listing", |s| {
        s.connection.is_open() && !s.conversations.is_empty()
    })
    .await
}

/// Next event that changes the visible conversation or typing state.
pub async fn next_change(rx: &mut broadcast::Receiver<SessionEvent>) -> SessionEvent {
    loop {
        let event = match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            Ok(Ok(event)) => event,
            Ok(Err(err)) => panic!("event stream failed: {err}"),
            Err(_) => panic!("no session event within 5 s"),
        };
        match event {
            SessionEvent::ConnectionChanged { .. } | SessionEvent::ConversationsLoaded { .. } => {}
            other => return other,
        }
    }
}
