//! Signaling envelope schema
//!
//! Envelopes are the relay-level protocol, one layer above negotiation
//! semantics: `get` asks the other participants for their full event log,
//! `send` delivers a batch of negotiation events. The relay validates and
//! fans these out without looking inside the carried events beyond schema
//! validation.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{ProtocolError, Result};
use crate::event::{split_type_tag, NegotiationEvent};

/// A relay-level message, tagged `type` on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Envelope {
    /// Request for the peer's full event log
    Get {
        /// Username of the requesting participant
        sender: String,
    },

    /// A batch of negotiation events
    Send {
        /// Username of the sending participant
        sender: String,
        /// The carried events, in the sender's log order
        events: Vec<NegotiationEvent>,
    },
}

impl Envelope {
    /// Create a `get` envelope
    pub fn get(sender: impl Into<String>) -> Self {
        Self::Get {
            sender: sender.into(),
        }
    }

    /// Create a `send` envelope
    pub fn send(sender: impl Into<String>, events: Vec<NegotiationEvent>) -> Self {
        Self::Send {
            sender: sender.into(),
            events,
        }
    }

    /// Username of the participant that emitted this envelope
    pub fn sender(&self) -> &str {
        match self {
            Self::Get { sender } | Self::Send { sender, .. } => sender,
        }
    }

    /// The wire tag, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Get { .. } => "get",
            Self::Send { .. } => "send",
        }
    }
}

fn decode_envelope(value: Value) -> Result<Envelope> {
    let (tag, fields) = split_type_tag(value)?;
    let fields = Value::Object(fields);
    match tag.as_str() {
        "get" => {
            let GetFields { sender } = serde_json::from_value(fields)?;
            Ok(Envelope::Get { sender })
        }
        "send" => {
            let SendFields { sender, events } = serde_json::from_value(fields)?;
            Ok(Envelope::Send { sender, events })
        }
        _ => Err(ProtocolError::UnknownType(tag)),
    }
}

impl<'de> Deserialize<'de> for Envelope {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        decode_envelope(value).map_err(D::Error::custom)
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct GetFields {
    sender: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SendFields {
    sender: String,
    events: Vec<NegotiationEvent>,
}
