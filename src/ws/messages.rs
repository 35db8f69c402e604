//! WebSocket frame types: outbound sends and decoded inbound events.

use serde::{Deserialize, Serialize};

use crate::domain::{ConversationId, Role};

/// Frame sent for every user message.
///
/// ```json
/// {"chat_id": 7, "role": "user", "content": "hi"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundFrame {
    /// Conversation active at send time; `null` when none is selected.
    pub chat_id: Option<ConversationId>,
    /// Always [`Role::User`].
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl OutboundFrame {
    /// Builds a user-message frame.
    #[must_use]
    pub fn user(chat_id: Option<ConversationId>, content: impl Into<String>) -> Self {
        Self {
            chat_id,
            role: Role::User,
            content: content.into(),
        }
    }

    /// Serializes the frame to JSON text.
    ///
    /// # Errors
    ///
    /// Returns the serializer error; cannot happen for well-formed ids.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Closed set of events decoded from inbound frames.
///
/// Exactly one variant is produced per frame; see
/// [`super::decoder::decode`] for the dispatch rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// The server is composing a reply.
    Typing,
    /// A chat message from the server.
    Message {
        /// Author (defaults to [`Role::Bot`]).
        role: Role,
        /// Text (defaults to empty).
        content: String,
    },
    /// The frame carried an `error` field.
    Error {
        /// The `error` value rendered as text.
        detail: String,
    },
    /// The frame was not a JSON object; shown verbatim as a bot message.
    Malformed {
        /// Raw frame text.
        raw: String,
    },
    /// A JSON object with an unknown `type` and no `error`. Ignored.
    Unrecognized {
        /// The `type` value, if any.
        kind: Option<String>,
    },
}

impl InboundEvent {
    /// Returns `true` if this event answers a pending send.
    #[must_use]
    pub const fn is_resolving(&self) -> bool {
        matches!(
            self,
            Self::Message { .. } | Self::Error { .. } | Self::Malformed { .. }
        )
    }

    /// Returns the event kind as a static string slice, for logging.
    #[must_use]
    pub const fn kind_str(&self) -> &'static str {
        match self {
            Self::Typing => "typing",
            Self::Message { .. } => "message",
            Self::Error { .. } => "error",
            Self::Malformed { .. } => "malformed",
            Self::Unrecognized { .. } => "unrecognized",
        }
    }
}
