//! Lifecycle states of the duplex connection.

use std::fmt;

use serde::Serialize;

/// State of the single duplex connection owned by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No socket.
    #[default]
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Frames may be sent.
    Open,
    /// Close requested, waiting for the socket to wind down.
    Closing,
}

impl ConnectionState {
    /// Returns `true` only in [`ConnectionState::Open`].
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
        })
    }
}
