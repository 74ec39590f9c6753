//! WebSocket message types: envelope and commands.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::BatonId;

/// Top-level WebSocket message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    /// Client-provided ID for requests; server-generated for events.
    pub id: String,
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: WsMessageType,
    /// ISO-8601 timestamp.
    pub timestamp: DateTime<Utc>,
    /// Variant-specific payload.
    pub payload: serde_json::Value,
}

impl WsMessage {
    /// Builds a server-originated message stamped with the current time.
    #[must_use]
    pub fn new(id: String, msg_type: WsMessageType, payload: serde_json::Value) -> Self {
        Self {
            id,
            msg_type,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Builds an error reply.
    #[must_use]
    pub fn error(id: String, code: u16, message: &str) -> Self {
        Self::new(
            id,
            WsMessageType::Error,
            serde_json::json!({ "code": code, "message": message }),
        )
    }
}

/// Discriminator for WebSocket message types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WsMessageType {
    /// Client → Server command.
    Command,
    /// Server → Client response to a command.
    Response,
    /// Server → Client broadcast event.
    Event,
    /// Server → Client error.
    Error,
}

/// Commands that a client can send in the payload of a
/// [`WsMessageType::Command`] message.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WsCommand {
    /// Subscribe to events for specific batons.
    Subscribe {
        /// Baton ids to follow. Use `["*"]` for every baton and for beacon
        /// link events.
        baton_ids: Vec<BatonSelector>,
    },
    /// Unsubscribe from events for specific batons.
    Unsubscribe {
        /// Baton ids to drop.
        baton_ids: Vec<BatonSelector>,
    },
}

/// One entry of a `baton_ids` list: a numeric id or a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BatonSelector {
    /// Numeric baton id.
    Id(BatonId),
    /// `"*"` or a baton id written as a string.
    Text(String),
}

/// Parsed `baton_ids` list.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Selection {
    /// Explicit baton ids.
    pub ids: Vec<BatonId>,
    /// Whether `"*"` was present.
    pub wildcard: bool,
    /// Entries that were neither an id nor `"*"`.
    pub rejected: Vec<String>,
}

impl Selection {
    /// Splits a selector list into ids, wildcard and rejects.
    #[must_use]
    pub fn from_selectors(selectors: Vec<BatonSelector>) -> Self {
        let mut selection = Self::default();
        for selector in selectors {
            match selector {
                BatonSelector::Id(id) => selection.ids.push(id),
                BatonSelector::Text(text) if text.trim() == "*" => selection.wildcard = true,
                BatonSelector::Text(text) => match text.trim().parse::<i32>() {
                    Ok(id) => selection.ids.push(BatonId::new(id)),
                    Err(_) => selection.rejected.push(text),
                },
            }
        }
        selection
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn parses_subscribe_command() {
        let json = serde_json::json!({ "command": "subscribe", "baton_ids": [1, "2", "*", "x"] });
        let Ok(WsCommand::Subscribe { baton_ids }) = serde_json::from_value::<WsCommand>(json)
        else {
            panic!("expected a subscribe command");
        };
        let selection = Selection::from_selectors(baton_ids);
        assert_eq!(selection.ids, vec![BatonId::new(1), BatonId::new(2)]);
        assert!(selection.wildcard);
        assert_eq!(selection.rejected, vec!["x".to_string()]);
    }

    #[test]
    fn unknown_command_is_rejected() {
        let json = serde_json::json!({ "command": "reset", "baton_ids": [] });
        assert!(serde_json::from_value::<WsCommand>(json).is_err());
    }
}
