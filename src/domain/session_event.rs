//! Notifications emitted after every session state change.
//!
//! Every mutation of the session store publishes a [`SessionEvent`] through
//! the [`super::EventBus`]. Front-ends subscribe to render the conversation
//! incrementally instead of polling snapshots.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{ConnectionState, ConversationId, ConversationSummary, Message};

/// Observable change of session state.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A message was appended to the visible conversation.
    MessageAppended {
        /// The appended message.
        message: Message,
        /// Position in the visible list.
        index: usize,
        /// When it was appended.
        timestamp: DateTime<Utc>,
    },

    /// The typing indicator flipped.
    TypingChanged {
        /// New value.
        typing: bool,
        /// When it changed.
        timestamp: DateTime<Utc>,
    },

    /// The visible conversation was replaced by a stored one.
    ConversationSwitched {
        /// Newly active conversation.
        conversation_id: ConversationId,
        /// The stored messages now shown.
        messages: Vec<Message>,
        /// When the switch happened.
        timestamp: DateTime<Utc>,
    },

    /// The conversation listing was (re)loaded.
    ConversationsLoaded {
        /// Listing in backend order.
        conversations: Vec<ConversationSummary>,
        /// When the listing arrived.
        timestamp: DateTime<Utc>,
    },

    /// The duplex connection changed state.
    ConnectionChanged {
        /// New state.
        state: ConnectionState,
        /// When the change was observed.
        timestamp: DateTime<Utc>,
    },

    /// A reply arrived for a send made in a conversation that is no longer
    /// active and was dropped from the view.
    ReplyDiscarded {
        /// The send it answered.
        send_id: Uuid,
        /// Conversation active when the send was made.
        conversation_id: Option<ConversationId>,
        /// When it was discarded.
        timestamp: DateTime<Utc>,
    },
}

impl SessionEvent {
    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::MessageAppended { .. } => "message_appended",
            Self::TypingChanged { .. } => "typing_changed",
            Self::ConversationSwitched { .. } => "conversation_switched",
            Self::ConversationsLoaded { .. } => "conversations_loaded",
            Self::ConnectionChanged { .. } => "connection_changed",
            Self::ReplyDiscarded { .. } => "reply_discarded",
        }
    }

    /// Returns the event timestamp.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::MessageAppended { timestamp, .. }
            | Self::TypingChanged { timestamp, .. }
            | Self::ConversationSwitched { timestamp, .. }
            | Self::ConversationsLoaded { timestamp, .. }
            | Self::ConnectionChanged { timestamp, .. }
            | Self::ReplyDiscarded { timestamp, .. } => *timestamp,
        }
    }
}
