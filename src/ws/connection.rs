//! WebSocket client connection.
//!
//! [`ConnectionManager`] owns the session's single duplex connection. A
//! background I/O task performs the handshake and then runs the read/write
//! loop: it is the only writer to and the only reader from the socket.
//! Inbound frames are decoded at the boundary and forwarded, in delivery
//! order, as [`ConnectionEvent`]s on one channel.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use super::decoder::{decode, decode_binary};
use super::messages::{InboundEvent, OutboundFrame};
use crate::api::endpoint;
use crate::domain::ConnectionState;
use crate::error::ChatError;

/// How long a local close waits for the server's close frame.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Anything that can transmit outbound frames. Implemented by
/// [`ConnectionManager`]; the session store only sees this seam.
pub trait FrameSink {
    /// Current connection state.
    fn state(&self) -> ConnectionState;

    /// Hands a frame to the socket writer.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::NotConnected`] unless the connection is open,
    /// or another [`ChatError`] if the frame cannot be handed over.
    fn transmit(&self, frame: &OutboundFrame) -> Result<(), ChatError>;
}

/// Notifications from the connection's I/O task.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// Handshake completed.
    Opened,
    /// A decoded inbound frame.
    Inbound(InboundEvent),
    /// The socket closed.
    Closed {
        /// `true` if [`ConnectionManager::close`] (or drop) asked for it.
        locally: bool,
    },
    /// Handshake or transport failure. The socket is gone.
    Failed {
        /// Human-readable cause.
        reason: String,
    },
}

#[derive(Debug)]
enum Outgoing {
    Text(String),
    Close,
}

/// Derives the duplex endpoint `<base>/ws?token=<token>`, mapping `http` to
/// `ws` and `https` to `wss`.
///
/// # Errors
///
/// Returns [`ChatError::InvalidEndpoint`] for schemes other than
/// `http(s)`/`ws(s)`.
pub fn socket_url(api_base: &Url, token: &str) -> Result<Url, ChatError> {
    let scheme = match api_base.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(ChatError::InvalidEndpoint(format!(
                "unsupported scheme `{other}`"
            )));
        }
    };
    let mut url = endpoint(api_base, "ws");
    url.set_scheme(scheme)
        .map_err(|()| ChatError::InvalidEndpoint(format!("cannot use scheme `{scheme}`")))?;
    url.query_pairs_mut().clear().append_pair("token", token);
    Ok(url)
}

/// Owner of the session's duplex connection.
///
/// Dropping the manager closes the socket, so a connection never outlives
/// the session that opened it.
#[derive(Debug)]
pub struct ConnectionManager {
    state: Arc<watch::Sender<ConnectionState>>,
    outbound: mpsc::UnboundedSender<Outgoing>,
    task: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    /// Starts connecting to `url` and returns immediately in
    /// [`ConnectionState::Connecting`].
    ///
    /// Handshake failures (including `connect_timeout` expiring) never
    /// surface here: they arrive as [`ConnectionEvent::Failed`] on
    /// `events`. Must be called from within a Tokio runtime.
    #[must_use]
    pub fn connect(
        url: &Url,
        events: mpsc::UnboundedSender<ConnectionEvent>,
        connect_timeout: Duration,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Connecting);
        let state = Arc::new(state);
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        tracing::info!(host = url.host_str().unwrap_or_default(), "connecting");
        let task = tokio::spawn(run_connection(
            url.to_string(),
            Arc::clone(&state),
            outbound_rx,
            events,
            connect_timeout,
        ));

        Self {
            state,
            outbound,
            task: Some(task),
        }
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Sends a frame. Only valid while open; otherwise the frame is
    /// dropped and the rejection returned.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::NotConnected`] with the current state when the
    /// connection is not open, or [`ChatError::FrameEncoding`] if the frame
    /// cannot be serialized.
    pub fn send(&self, frame: &OutboundFrame) -> Result<(), ChatError> {
        let state = self.state();
        if !state.is_open() {
            return Err(ChatError::NotConnected(state));
        }
        let json = frame
            .to_json()
            .map_err(ChatError::FrameEncoding)?;
        self.outbound
            .send(Outgoing::Text(json))
            .map_err(|_| ChatError::NotConnected(ConnectionState::Disconnected))
    }

    /// Closes the connection and waits for the I/O task to finish.
    /// Idempotent.
    pub async fn close(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        if self.outbound.send(Outgoing::Close).is_ok() {
            self.state.send_if_modified(|state| {
                let closing = matches!(state, ConnectionState::Open | ConnectionState::Connecting);
                if closing {
                    *state = ConnectionState::Closing;
                }
                closing
            });
        }
        if let Err(err) = task.await {
            tracing::warn!(error = %err, "connection task ended abnormally");
        }
        self.state.send_replace(ConnectionState::Disconnected);
    }
}

impl FrameSink for ConnectionManager {
    fn state(&self) -> ConnectionState {
        Self::state(self)
    }

    fn transmit(&self, frame: &OutboundFrame) -> Result<(), ChatError> {
        self.send(frame)
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if self.task.is_some() {
            // The I/O task finishes the close handshake on its own.
            let _ = self.outbound.send(Outgoing::Close);
        }
    }
}

/// Handshake, then the read/write loop until either side closes.
async fn run_connection(
    url: String,
    state: Arc<watch::Sender<ConnectionState>>,
    mut outbound: mpsc::UnboundedReceiver<Outgoing>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    connect_timeout: Duration,
) {
    let handshake = tokio::time::timeout(connect_timeout, tokio_tungstenite::connect_async(url));
    let socket = tokio::select! {
        result = handshake => match result {
            Ok(Ok((socket, _response))) => socket,
            Ok(Err(err)) => {
                finish(&state, &events, ConnectionEvent::Failed { reason: err.to_string() });
                return;
            }
            Err(_) => {
                finish(&state, &events, ConnectionEvent::Failed {
                    reason: format!("handshake timed out after {} s", connect_timeout.as_secs()),
                });
                return;
            }
        },
        // Only a close request (or the manager going away) can arrive here.
        _ = outbound.recv() => {
            finish(&state, &events, ConnectionEvent::Closed { locally: true });
            return;
        }
    };

    state.send_replace(ConnectionState::Open);
    tracing::info!("ws connected");
    let _ = events.send(ConnectionEvent::Opened);

    let (mut ws_tx, mut ws_rx) = socket.split();

    let terminal = loop {
        tokio::select! {
            // Frame from the server
            frame = ws_rx.next() => {
                let event = match frame {
                    Some(Ok(Message::Text(text))) => decode(text.as_str()),
                    Some(Ok(Message::Binary(bytes))) => decode_binary(&bytes),
                    Some(Ok(Message::Close(_))) | None => {
                        break ConnectionEvent::Closed { locally: false };
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => break ConnectionEvent::Failed { reason: err.to_string() },
                };
                tracing::trace!(kind = event.kind_str(), "frame received");
                let _ = events.send(ConnectionEvent::Inbound(event));
            }
            // Frame from the session
            command = outbound.recv() => {
                match command {
                    Some(Outgoing::Text(json)) => {
                        if let Err(err) = ws_tx.send(Message::text(json)).await {
                            break ConnectionEvent::Failed { reason: err.to_string() };
                        }
                    }
                    Some(Outgoing::Close) | None => {
                        state.send_replace(ConnectionState::Closing);
                        let _ = ws_tx.close().await;
                        let _ = tokio::time::timeout(CLOSE_GRACE, async {
                            while let Some(Ok(msg)) = ws_rx.next().await {
                                if msg.is_close() {
                                    break;
                                }
                            }
                        })
                        .await;
                        break ConnectionEvent::Closed { locally: true };
                    }
                }
            }
        }
    };

    finish(&state, &events, terminal);
}

fn finish(
    state: &watch::Sender<ConnectionState>,
    events: &mpsc::UnboundedSender<ConnectionEvent>,
    terminal: ConnectionEvent,
) {
    state.send_replace(ConnectionState::Disconnected);
    match &terminal {
        ConnectionEvent::Failed { reason } => tracing::warn!(%reason, "ws connection failed"),
        ConnectionEvent::Closed { locally } => tracing::info!(locally, "ws closed"),
        ConnectionEvent::Opened | ConnectionEvent::Inbound(_) => {}
    }
    let _ = events.send(terminal);
}
