//! Domain layer: messages, conversations, session state and event system.
//!
//! This module contains the client-side model: message and conversation
//! types, the conversation directory, the session state store that applies
//! user actions and server events, and the event bus that broadcasts every
//! state change to front-ends.

pub mod connection_state;
pub mod conversation;
pub mod conversation_id;
pub mod directory;
pub mod event_bus;
pub mod message;
pub mod session;
pub mod session_event;

pub use connection_state::ConnectionState;
pub use conversation::{Conversation, ConversationSummary};
pub use conversation_id::ConversationId;
pub use directory::ConversationDirectory;
pub use event_bus::EventBus;
pub use message::{Diagnostic, Message, Role};
pub use session::{PendingSend, SendOutcome, SessionState};
pub use session_event::SessionEvent;
