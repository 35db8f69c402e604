//! DTOs for `GET /chats`.

use serde::Deserialize;

use crate::domain::{Conversation, ConversationId, Message, Role};

/// One entry of the `GET /chats` response.
///
/// Every field is optional on the wire; entries without an `id` cannot be
/// selected and are skipped by [`into_conversations`].
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationDto {
    /// Backend id.
    #[serde(default)]
    pub id: Option<ConversationId>,
    /// Optional title.
    #[serde(default)]
    pub title: Option<String>,
    /// Optional stored history.
    #[serde(default)]
    pub messages: Option<Vec<HistoryMessageDto>>,
}

/// Stored history entry.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryMessageDto {
    /// `"user"`, anything else is shown as the bot.
    #[serde(default)]
    pub role: Option<String>,
    /// Message text.
    #[serde(default)]
    pub content: Option<String>,
}

impl From<HistoryMessageDto> for Message {
    fn from(dto: HistoryMessageDto) -> Self {
        Self {
            role: dto.role.as_deref().map_or(Role::Bot, Role::from_wire),
            content: dto.content.unwrap_or_default(),
        }
    }
}

/// Converts a listing into domain conversations, preserving order.
#[must_use]
pub fn into_conversations(listing: Vec<ConversationDto>) -> Vec<Conversation> {
    listing
        .into_iter()
        .enumerate()
        .filter_map(|(index, dto)| {
            let Some(id) = dto.id else {
                tracing::warn!(index, "skipping conversation without id");
                return None;
            };
            let messages = dto
                .messages
                .unwrap_or_default()
                .into_iter()
                .map(Message::from)
                .collect();
            Some(Conversation::new(id, dto.title, messages))
        })
        .collect()
}
