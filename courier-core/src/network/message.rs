// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Wire Messages
//!
//! Every frame on the wire is a JSON object with a `type` (the message kind)
//! and a `channel`, plus any number of additional fields:
//!
//! ```text
//! {"type": "subscribe", "channel": "broadcast"}
//! {"type": "ping", "channel": "broadcast", "count": 1}
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::error::NetworkError;
use super::transport::TransportResult;

/// Kind of the control message that registers interest in a channel.
pub const SUBSCRIBE_KIND: &str = "subscribe";

/// A structured message exchanged with the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message kind, used to route inbound messages to handlers.
    #[serde(rename = "type")]
    pub kind: String,
    /// Channel the message belongs to. Informational only; routing uses `kind`.
    #[serde(default, deserialize_with = "channel_from_any")]
    pub channel: String,
    /// Remaining payload fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Message {
    /// Creates a message with no payload fields.
    pub fn new(kind: impl Into<String>, channel: impl Into<String>) -> Self {
        Message {
            kind: kind.into(),
            channel: channel.into(),
            fields: Map::new(),
        }
    }

    /// Creates the control message announcing interest in `channel`.
    pub fn subscribe(channel: impl Into<String>) -> Self {
        Message::new(SUBSCRIBE_KIND, channel)
    }

    /// Returns true for subscribe control messages.
    pub fn is_subscribe(&self) -> bool {
        self.kind == SUBSCRIBE_KIND
    }

    /// Adds a payload field.
    ///
    /// `type` and `channel` are stored in their dedicated fields when given a
    /// string, so they never appear twice on the wire.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        match (key.as_str(), value.into()) {
            ("type", Value::String(kind)) => self.kind = kind,
            ("channel", Value::String(channel)) => self.channel = channel,
            (_, value) => {
                self.fields.insert(key, value);
            }
        }
        self
    }

    /// Returns a payload field by name.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Serializes the message to its wire text.
    pub fn encode(&self) -> TransportResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses wire text into a message.
    ///
    /// Fails if the payload is not a JSON object or lacks a string `type`.
    pub fn decode(raw: &str) -> TransportResult<Message> {
        let value: Value = serde_json::from_str(raw)?;
        if !value.is_object() {
            return Err(NetworkError::InvalidMessage(
                "expected a JSON object".into(),
            ));
        }
        Ok(serde_json::from_value(value)?)
    }
}

/// Accepts any JSON value as a channel: `null` reads as no channel and
/// non-string values keep their JSON text.
fn channel_from_any<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(channel) => channel,
        other => other.to_string(),
    })
}

impl TryFrom<Value> for Message {
    type Error = NetworkError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        if !value.is_object() {
            return Err(NetworkError::InvalidMessage(
                "expected a JSON object".into(),
            ));
        }
        Ok(serde_json::from_value(value)?)
    }
}
