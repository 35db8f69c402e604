//! # chat-session
//!
//! Client-side realtime chat session manager.
//!
//! This crate keeps one live WebSocket connection to a chat backend,
//! multiplexes user actions (sending a message, switching conversation,
//! uploading an attachment) against asynchronously arriving server events
//! (replies, typing indicators, errors), and keeps a local view of the
//! conversation consistent with what the server believes.
//!
//! ## Architecture
//!
//! ```text
//! Front-end (CLI, UI)
//!     │  commands            ▲ SessionEvents (EventBus)
//!     ▼                      │
//! SessionService ── actor task (service/)
//!     │
//!     ├── SessionState + ConversationDirectory (domain/)
//!     ├── ConnectionManager ── decoder (ws/)   ⇄  <api_base>/ws
//!     └── BackendClient (api/)                 →  /chats, /upload
//! ```
//!
//! All session mutations happen on the actor task, in arrival order.

pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod ws;
