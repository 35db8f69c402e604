//! Inbound frame decoding.
//!
//! Frames are turned into [`InboundEvent`]s once, at the boundary; nothing
//! downstream inspects raw JSON. Decoding never fails: anything that is not
//! a JSON object degrades to [`InboundEvent::Malformed`] so no frame is ever
//! dropped silently.
//!
//! # Dispatch precedence
//!
//! 1. Not JSON, or JSON but not an object → `Malformed { raw }`.
//! 2. Object with an `error` key (any value, even `null`) → `Error`. The
//!    error key wins over `type`: `{"type":"message","error":"x"}` is an
//!    error, not a message.
//! 3. `"type": "typing"` → `Typing`.
//! 4. `"type": "message"` → `Message`, `from` defaulting to the bot and
//!    `content` defaulting to the empty string.
//! 5. Anything else → `Unrecognized`.

use serde_json::{Map, Value};

use super::messages::InboundEvent;
use crate::domain::Role;

/// Decodes one text frame. Pure: the same input always yields the same
/// event.
#[must_use]
pub fn decode(raw: &str) -> InboundEvent {
    let Ok(Value::Object(object)) = serde_json::from_str::<Value>(raw) else {
        return InboundEvent::Malformed {
            raw: raw.to_string(),
        };
    };

    if let Some(error) = object.get("error") {
        return InboundEvent::Error {
            detail: value_text(error),
        };
    }

    match object.get("type").and_then(Value::as_str) {
        Some("typing") => InboundEvent::Typing,
        Some("message") => decode_message(&object),
        other => InboundEvent::Unrecognized {
            kind: other.map(str::to_string),
        },
    }
}

/// Decodes a binary frame as lossy UTF-8 text.
#[must_use]
pub fn decode_binary(bytes: &[u8]) -> InboundEvent {
    decode(&String::from_utf8_lossy(bytes))
}

fn decode_message(object: &Map<String, Value>) -> InboundEvent {
    let role = object
        .get("from")
        .and_then(Value::as_str)
        .map_or(Role::Bot, Role::from_wire);
    let content = match object.get("content") {
        None | Some(Value::Null) => String::new(),
        Some(value) => value_text(value),
    };
    InboundEvent::Message { role, content }
}

/// Strings verbatim, everything else as compact JSON.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
