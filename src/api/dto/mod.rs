//! Data Transfer Objects for the backend's REST responses.
//!
//! Wire shapes are lenient: missing or `null` fields fall back to defaults
//! instead of failing the whole response.

pub mod conversation_dto;
pub mod upload_dto;

pub use conversation_dto::*;
pub use upload_dto::*;
