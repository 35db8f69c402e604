//! Session error types with diagnostic message mapping.
//!
//! [`ChatError`] is the central error type of the client. The core
//! failures (connection, server-reported, malformed frame, request) never
//! halt a session: each variant maps to a fixed diagnostic chat message via
//! [`ChatError::diagnostic`], which the session appends to the visible
//! conversation instead of propagating the fault.

use crate::domain::{ConnectionState, ConversationId, Diagnostic};

/// Client-side error enum.
///
/// # Diagnostic mapping
///
/// | Variant               | Appended message                          |
/// |-----------------------|-------------------------------------------|
/// | `ConnectionFailure`   | `⚠️ Connection error. Please refresh.`    |
/// | `ServerReported`      | `⚠️ Error occurred`                        |
/// | `ReplyTimeout`        | `⚠️ No response from server`               |
/// | `RequestFailure`      | per operation (chats / upload)             |
/// | others                | none, returned to the caller               |
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Handshake, close or transport error on the duplex connection.
    #[error("connection failure: {0}")]
    ConnectionFailure(String),

    /// The server sent a frame carrying an `error` field.
    #[error("server reported an error: {0}")]
    ServerReported(String),

    /// The server never answered a send within the reply timeout.
    #[error("no reply within {timeout_secs} s")]
    ReplyTimeout {
        /// Configured reply timeout in seconds.
        timeout_secs: u64,
    },

    /// An inbound frame could not be decoded.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// An outbound frame could not be serialized.
    #[error("outbound frame could not be encoded: {0}")]
    FrameEncoding(#[source] serde_json::Error),

    /// An out-of-band HTTP request failed.
    #[error("{operation} request failed: {source}")]
    RequestFailure {
        /// Which request failed.
        operation: RequestKind,
        /// Underlying HTTP error.
        #[source]
        source: reqwest::Error,
    },

    /// A send was attempted while the connection was not open.
    #[error("connection is not open (state: {0})")]
    NotConnected(ConnectionState),

    /// The requested conversation is not in the directory.
    #[error("conversation not found: {0}")]
    UnknownConversation(ConversationId),

    /// The configured API base URL cannot be turned into an endpoint.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The HTTP client could not be constructed.
    #[error("http client setup failed: {0}")]
    ClientSetup(#[source] reqwest::Error),

    /// No credential is available; the caller must redirect to login.
    #[error("missing credential: log in first")]
    MissingCredential,

    /// Local I/O failure (reading an attachment).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The session actor has shut down.
    #[error("session closed")]
    SessionClosed,
}

/// Out-of-band request kinds, used for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// `GET /chats`.
    ListConversations,
    /// `POST /upload`.
    Upload,
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ListConversations => f.write_str("conversation listing"),
            Self::Upload => f.write_str("upload"),
        }
    }
}

impl ChatError {
    /// Returns the fixed chat message surfaced for this error, if the
    /// error is recovered in-session rather than returned to the caller.
    #[must_use]
    pub const fn diagnostic(&self) -> Option<Diagnostic> {
        match self {
            Self::ConnectionFailure(_) => Some(Diagnostic::ConnectionError),
            Self::ServerReported(_) => Some(Diagnostic::ServerError),
            Self::ReplyTimeout { .. } => Some(Diagnostic::ReplyTimedOut),
            Self::RequestFailure { operation, .. } => match operation {
                RequestKind::ListConversations => Some(Diagnostic::LoadConversationsFailed),
                RequestKind::Upload => Some(Diagnostic::UploadFailed),
            },
            // Malformed frames are shown verbatim, not as a diagnostic.
            Self::MalformedFrame(_)
            | Self::FrameEncoding(_)
            | Self::NotConnected(_)
            | Self::UnknownConversation(_)
            | Self::InvalidEndpoint(_)
            | Self::ClientSetup(_)
            | Self::MissingCredential
            | Self::Io(_)
            | Self::SessionClosed => None,
        }
    }

    /// Returns `true` if this error ends the session.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::MissingCredential)
    }
}
