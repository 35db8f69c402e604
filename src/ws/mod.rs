//! WebSocket layer: the duplex connection, frame types and decoding.
//!
//! The connection at `<api_base>/ws?token=<token>` carries user messages
//! out and typing indicators, replies and errors back.

pub mod connection;
pub mod decoder;
pub mod messages;

pub use connection::{ConnectionEvent, ConnectionManager, FrameSink, socket_url};
pub use decoder::{decode, decode_binary};
pub use messages::{InboundEvent, OutboundFrame};
