//! Service layer: the session actor and its handle.

pub mod session_service;

pub use session_service::{SessionService, SessionSnapshot};
