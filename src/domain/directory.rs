//! Conversation directory: the listing returned by the backend.
//!
//! The directory owns every [`Conversation`] the session knows about and
//! keeps them in the order the backend returned them. It never re-sorts.
//! Selecting a conversation hands its stored history to the
//! [`super::SessionState`].

use super::{Conversation, ConversationId, ConversationSummary, SessionState};
use crate::error::ChatError;

/// In-memory conversation listing.
#[derive(Debug, Default)]
pub struct ConversationDirectory {
    conversations: Vec<Conversation>,
}

impl ConversationDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the listing with a freshly fetched one.
    pub fn replace(&mut self, conversations: Vec<Conversation>) {
        self.conversations = conversations;
    }

    /// Looks up a conversation by id.
    #[must_use]
    pub fn get(&self, id: &ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| &c.id == id)
    }

    /// Listing summaries in backend order.
    #[must_use]
    pub fn summaries(&self) -> Vec<ConversationSummary> {
        self.conversations
            .iter()
            .enumerate()
            .map(|(index, c)| ConversationSummary::of(c, index))
            .collect()
    }

    /// Number of conversations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    /// Returns `true` if nothing has been listed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Makes `id` the active conversation of `session`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::UnknownConversation`] if `id` is not listed;
    /// the session is left unchanged.
    pub fn select(&self, id: &ConversationId, session: &mut SessionState) -> Result<(), ChatError> {
        let conversation = self
            .get(id)
            .ok_or_else(|| ChatError::UnknownConversation(id.clone()))?;
        session.switch_to(conversation);
        Ok(())
    }
}
