//! Opaque conversation identifier.
//!
//! The backend is free to identify conversations with integers or strings.
//! [`ConversationId`] keeps whichever form it received so the id is sent
//! back in outbound frames and upload forms exactly as the server issued it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of a conversation, as issued by the backend.
///
/// Serialized untagged: `7` and `"7"` are distinct ids and round-trip
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConversationId {
    /// Numeric id (`{"id": 7}`).
    Number(i64),
    /// String id (`{"id": "a1b2"}`).
    Text(String),
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ConversationId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for ConversationId {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Parses user input: integers become [`ConversationId::Number`], anything
/// else [`ConversationId::Text`]. Never fails.
impl FromStr for ConversationId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(s.parse::<i64>()
            .map_or_else(|_| Self::Text(s.to_string()), Self::Number))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn numeric_and_text_ids_differ() {
        assert_ne!(ConversationId::from(7), ConversationId::from("7"));
    }

    #[test]
    fn display_has_no_quotes() {
        assert_eq!(ConversationId::from(7).to_string(), "7");
        assert_eq!(ConversationId::from("abc").to_string(), "abc");
    }

    #[test]
    fn serde_keeps_wire_form() {
        let Ok(num) = serde_json::from_str::<ConversationId>("7") else {
            panic!("numeric id should deserialize");
        };
        assert_eq!(num, ConversationId::Number(7));
        let Ok(text) = serde_json::from_str::<ConversationId>("\"x-1\"") else {
            panic!("string id should deserialize");
        };
        assert_eq!(text, ConversationId::from("x-1"));
        assert_eq!(serde_json::to_string(&num).ok().as_deref(), Some("7"));
        assert_eq!(serde_json::to_string(&text).ok().as_deref(), Some("\"x-1\""));
    }

    #[test]
    fn parse_prefers_numbers() {
        assert_eq!("42".parse::<ConversationId>(), Ok(ConversationId::Number(42)));
        assert_eq!(
            " general ".parse::<ConversationId>(),
            Ok(ConversationId::from("general"))
        );
    }
}
