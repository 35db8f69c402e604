//! Chat messages and the fixed diagnostic messages.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The local user.
    User,
    /// The chat backend.
    Bot,
}

impl Role {
    /// Maps a wire role string: `"user"` is [`Role::User`], anything else
    /// is attributed to the bot.
    #[must_use]
    pub fn from_wire(role: &str) -> Self {
        if role == "user" { Self::User } else { Self::Bot }
    }

    /// Returns the wire string for this role.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Bot => "bot",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_wire(&raw))
    }
}

/// A single chat message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who wrote it.
    pub role: Role,
    /// Display text.
    #[serde(default)]
    pub content: String,
}

impl Message {
    /// Creates a user-authored message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Creates a bot-authored message.
    #[must_use]
    pub fn bot(content: impl Into<String>) -> Self {
        Self {
            role: Role::Bot,
            content: content.into(),
        }
    }

    /// User message announcing an uploaded attachment.
    #[must_use]
    pub fn attachment(filename: &str) -> Self {
        Self::user(format!("📎 {filename}"))
    }
}

impl From<Diagnostic> for Message {
    fn from(diagnostic: Diagnostic) -> Self {
        Self::bot(diagnostic.text())
    }
}

/// Fixed bot-role messages appended when a failure is recovered in-session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnostic {
    /// A frame carried an `error` field.
    ServerError,
    /// The server did not answer a send in time.
    ReplyTimedOut,
    /// Handshake or transport error.
    ConnectionError,
    /// The server closed the connection.
    ConnectionClosed,
    /// `GET /chats` failed.
    LoadConversationsFailed,
    /// `POST /upload` failed.
    UploadFailed,
}

impl Diagnostic {
    /// Text shown in the conversation.
    #[must_use]
    pub const fn text(&self) -> &'static str {
        match self {
            Self::ServerError => "⚠️ Error occurred",
            Self::ReplyTimedOut => "⚠️ No response from server",
            Self::ConnectionError => "⚠️ Connection error. Please refresh.",
            Self::ConnectionClosed => "⚠️ Connection closed.",
            Self::LoadConversationsFailed => "⚠️ Failed to load chats",
            Self::UploadFailed => "⚠️ File upload failed",
        }
    }
}
