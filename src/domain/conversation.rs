//! Conversations as held by the directory.

use serde::{Deserialize, Serialize};

use super::{ConversationId, Message};

/// A named, ordered thread of messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Backend-issued identifier.
    pub id: ConversationId,
    /// Optional title; see [`Conversation::display_title`].
    #[serde(default)]
    pub title: Option<String>,
    /// Stored history, oldest first.
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Creates a conversation.
    #[must_use]
    pub fn new(id: ConversationId, title: Option<String>, messages: Vec<Message>) -> Self {
        Self {
            id,
            title,
            messages,
        }
    }

    /// Title for listings. Untitled conversations are shown as
    /// `Chat #<position>`, with `index` being the 0-based list position.
    #[must_use]
    pub fn display_title(&self, index: usize) -> String {
        match self.title.as_deref() {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => format!("Chat #{}", index.saturating_add(1)),
        }
    }
}

/// Lightweight listing entry used in snapshots and events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationSummary {
    /// Conversation id.
    pub id: ConversationId,
    /// Display title (never empty).
    pub title: String,
    /// Number of stored messages.
    pub message_count: usize,
}

impl ConversationSummary {
    /// Builds the summary of the conversation at list position `index`.
    #[must_use]
    pub fn of(conversation: &Conversation, index: usize) -> Self {
        Self {
            id: conversation.id.clone(),
            title: conversation.display_title(index),
            message_count: conversation.messages.len(),
        }
    }
}
