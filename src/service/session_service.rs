//! Session service: the single logical thread of control for a session.
//!
//! [`SessionService::start`] spawns one actor task that owns the
//! [`SessionState`], the [`ConversationDirectory`] and the
//! [`ConnectionManager`]. User commands, decoded frames, HTTP completions
//! and the reply timer all arrive on queues drained by that task, so every
//! mutation is serialized without locks. HTTP requests run in their own
//! tasks and never stall the connection or the actor.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::Url;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;

use crate::api::{Attachment, BackendClient};
use crate::auth::CredentialStore;
use crate::config::ClientConfig;
use crate::domain::{
    ConnectionState, ConversationDirectory, ConversationId, ConversationSummary, Diagnostic,
    EventBus, Message, SendOutcome, SessionEvent, SessionState,
};
use crate::error::ChatError;
use crate::ws::{ConnectionEvent, ConnectionManager, socket_url};

/// Command queue depth between handles and the actor.
const COMMAND_CAPACITY: usize = 64;

/// Point-in-time copy of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    /// Active conversation, if one was selected.
    pub active_conversation_id: Option<ConversationId>,
    /// Visible messages, oldest first.
    pub messages: Vec<Message>,
    /// Typing indicator.
    pub typing: bool,
    /// Sends still awaiting a reply.
    pub pending_sends: usize,
    /// Connection state.
    pub connection: ConnectionState,
    /// Conversation listing in backend order.
    pub conversations: Vec<ConversationSummary>,
}

#[derive(Debug)]
enum Command {
    Send {
        input: String,
        reply: oneshot::Sender<SendOutcome>,
    },
    Select {
        id: ConversationId,
        reply: oneshot::Sender<Result<(), ChatError>>,
    },
    Upload {
        attachment: Attachment,
    },
    Refresh,
    Reconnect {
        reply: oneshot::Sender<bool>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Results of out-of-band requests, posted back to the actor.
#[derive(Debug)]
enum Completion {
    Conversations(Result<Vec<crate::domain::Conversation>, ChatError>),
    Upload(Result<String, ChatError>),
}

/// Handle to a running chat session.
///
/// Cheap to clone. All methods enqueue a command for the session actor;
/// the ones returning a value wait for the actor to process it.
#[derive(Debug, Clone)]
pub struct SessionService {
    commands: mpsc::Sender<Command>,
    events: EventBus,
    credentials: Arc<dyn CredentialStore>,
}

impl SessionService {
    /// Starts a session: reads the token, opens the duplex connection and
    /// requests the conversation listing. Must be called from within a
    /// Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::MissingCredential`] when `credentials` holds no
    /// token (the caller should send the user to login), or a configuration
    /// error if the endpoints cannot be derived.
    pub fn start(
        config: &ClientConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, ChatError> {
        let token = credentials.token().ok_or(ChatError::MissingCredential)?;
        let socket_url = socket_url(&config.api_base, &token)?;
        let backend = BackendClient::new(config.api_base.clone(), token, config.request_timeout)?;
        let events = EventBus::new(config.event_bus_capacity);

        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (connection_tx, connection_rx) = mpsc::unbounded_channel();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        let connection =
            ConnectionManager::connect(&socket_url, connection_tx.clone(), config.connect_timeout);
        let _ = events.publish(SessionEvent::ConnectionChanged {
            state: ConnectionState::Connecting,
            timestamp: Utc::now(),
        });

        let actor = SessionActor {
            state: SessionState::new(events.clone()),
            directory: ConversationDirectory::new(),
            connection,
            connection_live: true,
            socket_url,
            connect_timeout: config.connect_timeout,
            connection_tx,
            backend,
            events: events.clone(),
            reply_timeout: config.reply_timeout,
            completions_tx,
        };
        tokio::spawn(actor.run(commands_rx, connection_rx, completions_rx));

        tracing::info!(api_base = %config.api_base, "session started");
        Ok(Self {
            commands: commands_tx,
            events,
            credentials,
        })
    }

    /// Receives every future [`SessionEvent`].
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Sends a user message. See [`SessionState::send`] for the rules.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::SessionClosed`] if the session has shut down.
    pub async fn send_message(&self, input: impl Into<String>) -> Result<SendOutcome, ChatError> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Send {
            input: input.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| ChatError::SessionClosed)
    }

    /// Switches the visible conversation to `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::UnknownConversation`] if `id` is not in the
    /// listing, or [`ChatError::SessionClosed`].
    pub async fn select_conversation(&self, id: ConversationId) -> Result<(), ChatError> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Select { id, reply }).await?;
        rx.await.map_err(|_| ChatError::SessionClosed)?
    }

    /// Uploads `attachment` for the active conversation. Returns once the
    /// upload is queued; its outcome appears as a chat message.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::SessionClosed`] if the session has shut down.
    pub async fn upload(&self, attachment: Attachment) -> Result<(), ChatError> {
        self.request(Command::Upload { attachment }).await
    }

    /// Re-fetches the conversation listing in the background.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::SessionClosed`] if the session has shut down.
    pub async fn refresh_conversations(&self) -> Result<(), ChatError> {
        self.request(Command::Refresh).await
    }

    /// Opens a new connection if the previous one has gone away. Returns
    /// `false` if a connection is still live.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::SessionClosed`] if the session has shut down.
    pub async fn reconnect(&self) -> Result<bool, ChatError> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Reconnect { reply }).await?;
        rx.await.map_err(|_| ChatError::SessionClosed)
    }

    /// Copies the current session state.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::SessionClosed`] if the session has shut down.
    pub async fn snapshot(&self) -> Result<SessionSnapshot, ChatError> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Snapshot { reply }).await?;
        rx.await.map_err(|_| ChatError::SessionClosed)
    }

    /// Closes the connection and stops the actor. Idempotent.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.request(Command::Shutdown { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }

    /// Forgets the credential and shuts the session down.
    pub async fn logout(&self) {
        self.credentials.clear();
        self.shutdown().await;
        tracing::info!("logged out");
    }

    async fn request(&self, command: Command) -> Result<(), ChatError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ChatError::SessionClosed)
    }
}

/// Owner of all session state. Lives inside the actor task.
#[derive(Debug)]
struct SessionActor {
    state: SessionState,
    directory: ConversationDirectory,
    connection: ConnectionManager,
    /// False once the current connection's terminal event was applied.
    connection_live: bool,
    socket_url: Url,
    connect_timeout: Duration,
    connection_tx: mpsc::UnboundedSender<ConnectionEvent>,
    backend: BackendClient,
    events: EventBus,
    reply_timeout: Option<Duration>,
    completions_tx: mpsc::UnboundedSender<Completion>,
}

impl SessionActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut connection_events: mpsc::UnboundedReceiver<ConnectionEvent>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
    ) {
        self.spawn_listing();

        loop {
            let deadline = self
                .reply_timeout
                .and_then(|timeout| self.state.next_deadline(timeout));

            tokio::select! {
                // User command
                command = commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        self.connection.close().await;
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        self.connection.close().await;
                        break;
                    }
                },
                // Connection I/O task
                Some(event) = connection_events.recv() => self.handle_connection_event(event),
                // Finished HTTP request
                Some(done) = completions.recv() => self.handle_completion(done),
                // Oldest pending send ran out of time
                () = sleep_until(deadline) => {
                    if let Some(timeout) = self.reply_timeout {
                        self.state.expire(Instant::now(), timeout);
                    }
                }
            }
        }

        tracing::debug!("session actor stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Send { input, reply } => {
                let outcome = self.state.send(&input, &self.connection);
                let _ = reply.send(outcome);
            }
            Command::Select { id, reply } => {
                let result = self.directory.select(&id, &mut self.state);
                let _ = reply.send(result);
            }
            Command::Upload { attachment } => self.spawn_upload(attachment),
            Command::Refresh => self.spawn_listing(),
            Command::Reconnect { reply } => {
                let _ = reply.send(self.reconnect());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            // Handled by the run loop.
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    fn handle_connection_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Opened => self.publish_connection(ConnectionState::Open),
            ConnectionEvent::Inbound(event) => self.state.apply(event),
            ConnectionEvent::Closed { locally } => {
                self.connection_live = false;
                self.publish_connection(ConnectionState::Disconnected);
                let diagnostic = (!locally).then_some(Diagnostic::ConnectionClosed);
                self.state.connection_lost(diagnostic);
            }
            ConnectionEvent::Failed { reason } => {
                self.connection_live = false;
                self.publish_connection(ConnectionState::Disconnected);
                let err = ChatError::ConnectionFailure(reason);
                tracing::warn!(error = %err, "connection lost");
                self.state.connection_lost(err.diagnostic());
            }
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Conversations(Ok(conversations)) => {
                self.directory.replace(conversations);
                tracing::info!(count = self.directory.len(), "conversations loaded");
                let _ = self.events.publish(SessionEvent::ConversationsLoaded {
                    conversations: self.directory.summaries(),
                    timestamp: Utc::now(),
                });
            }
            Completion::Upload(Ok(filename)) => {
                self.state.append(Message::attachment(&filename));
            }
            Completion::Conversations(Err(err)) | Completion::Upload(Err(err)) => {
                tracing::warn!(error = %err, "request failed");
                if let Some(diagnostic) = err.diagnostic() {
                    self.state.append(diagnostic.into());
                }
            }
        }
    }

    fn spawn_listing(&self) {
        let backend = self.backend.clone();
        let done = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = backend.list_conversations().await;
            let _ = done.send(Completion::Conversations(result));
        });
    }

    fn spawn_upload(&self, attachment: Attachment) {
        let backend = self.backend.clone();
        let done = self.completions_tx.clone();
        let chat_id = self.state.active_conversation_id().cloned();
        tokio::spawn(async move {
            let result = backend.upload(attachment, chat_id.as_ref()).await;
            let _ = done.send(Completion::Upload(result));
        });
    }

    fn reconnect(&mut self) -> bool {
        if self.connection_live {
            return false;
        }
        // The old manager's task has already finished; dropping it is a no-op.
        self.connection = ConnectionManager::connect(
            &self.socket_url,
            self.connection_tx.clone(),
            self.connect_timeout,
        );
        self.connection_live = true;
        self.publish_connection(ConnectionState::Connecting);
        true
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            active_conversation_id: self.state.active_conversation_id().cloned(),
            messages: self.state.messages().to_vec(),
            typing: self.state.is_typing(),
            pending_sends: self.state.pending().count(),
            connection: self.connection.state(),
            conversations: self.directory.summaries(),
        }
    }

    fn publish_connection(&self, state: ConnectionState) {
        let _ = self.events.publish(SessionEvent::ConnectionChanged {
            state,
            timestamp: Utc::now(),
        });
    }
}

/// Sleeps until `deadline`, or forever without one.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
