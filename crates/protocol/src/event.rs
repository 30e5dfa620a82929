//! Negotiation event schema
//!
//! One `NegotiationEvent` is a single unit of session-establishment data:
//! the host's offer, the guest's answer, one ICE candidate, or the
//! `gathered` sentinel a side emits once it has finished producing
//! candidates. Events are tagged on the wire with a `type` field and use
//! camelCase field names.
//!
//! Decoding is strict. serde's internally-tagged derive cannot reject
//! unknown fields, so deserialization is written by hand: the `type` tag is
//! split off and the remainder is decoded into a `deny_unknown_fields`
//! struct per variant.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{ProtocolError, Result};

/// A single negotiation event, tagged `type` on the wire
///
/// `session_description` and `candidate` carry serialized structures the
/// protocol never interprets: they are transported verbatim and attributed
/// to their sender, nothing more.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NegotiationEvent {
    /// The host's proposed session description
    Offer {
        /// Username of the emitting participant
        sender: String,
        /// Opaque serialized session description
        #[serde(rename = "sessionDescription")]
        session_description: String,
    },

    /// The guest's accepting session description
    Answer {
        /// Username of the emitting participant
        sender: String,
        /// Opaque serialized session description
        #[serde(rename = "sessionDescription")]
        session_description: String,
    },

    /// One ICE candidate, emitted zero or more times per side
    Candidate {
        /// Username of the emitting participant
        sender: String,
        /// Opaque serialized candidate
        candidate: String,
    },

    /// Sentinel: the sender has finished emitting candidates
    Gathered {
        /// Username of the emitting participant
        sender: String,
    },
}

impl NegotiationEvent {
    /// Create an offer event
    pub fn offer(sender: impl Into<String>, session_description: impl Into<String>) -> Self {
        Self::Offer {
            sender: sender.into(),
            session_description: session_description.into(),
        }
    }

    /// Create an answer event
    pub fn answer(sender: impl Into<String>, session_description: impl Into<String>) -> Self {
        Self::Answer {
            sender: sender.into(),
            session_description: session_description.into(),
        }
    }

    /// Create a candidate event
    pub fn candidate(sender: impl Into<String>, candidate: impl Into<String>) -> Self {
        Self::Candidate {
            sender: sender.into(),
            candidate: candidate.into(),
        }
    }

    /// Create a gathered sentinel event
    pub fn gathered(sender: impl Into<String>) -> Self {
        Self::Gathered {
            sender: sender.into(),
        }
    }

    /// Username of the participant that emitted this event
    pub fn sender(&self) -> &str {
        match self {
            Self::Offer { sender, .. }
            | Self::Answer { sender, .. }
            | Self::Candidate { sender, .. }
            | Self::Gathered { sender } => sender,
        }
    }

    /// The wire tag, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::Candidate { .. } => "candidate",
            Self::Gathered { .. } => "gathered",
        }
    }
}

/// Split the `type` tag off a decoded JSON object
pub(crate) fn split_type_tag(value: Value) -> Result<(String, Map<String, Value>)> {
    let mut object = match value {
        Value::Object(map) => map,
        _ => return Err(ProtocolError::NotAnObject),
    };
    match object.remove("type") {
        Some(Value::String(tag)) => Ok((tag, object)),
        _ => Err(ProtocolError::MissingType),
    }
}

fn decode_event(value: Value) -> Result<NegotiationEvent> {
    let (tag, fields) = split_type_tag(value)?;
    let fields = Value::Object(fields);
    match tag.as_str() {
        "offer" => {
            let DescriptionFields {
                sender,
                session_description,
            } = serde_json::from_value(fields)?;
            Ok(NegotiationEvent::Offer {
                sender,
                session_description,
            })
        }
        "answer" => {
            let DescriptionFields {
                sender,
                session_description,
            } = serde_json::from_value(fields)?;
            Ok(NegotiationEvent::Answer {
                sender,
                session_description,
            })
        }
        "candidate" => {
            let CandidateFields { sender, candidate } = serde_json::from_value(fields)?;
            Ok(NegotiationEvent::Candidate { sender, candidate })
        }
        "gathered" => {
            let SenderFields { sender } = serde_json::from_value(fields)?;
            Ok(NegotiationEvent::Gathered { sender })
        }
        _ => Err(ProtocolError::UnknownType(tag)),
    }
}

impl<'de> Deserialize<'de> for NegotiationEvent {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        decode_event(value).map_err(D::Error::custom)
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DescriptionFields {
    sender: String,
    #[serde(rename = "sessionDescription")]
    session_description: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CandidateFields {
    sender: String,
    candidate: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SenderFields {
    sender: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_all_event_kinds() {
        let offer: NegotiationEvent =
            serde_json::from_str(r#"{"type":"offer","sender":"h1","sessionDescription":"sdp-o"}"#)
                .unwrap();
        assert_eq!(offer, NegotiationEvent::offer("h1", "sdp-o"));

        let answer: NegotiationEvent =
            serde_json::from_str(r#"{"type":"answer","sender":"g1","sessionDescription":"sdp-a"}"#)
                .unwrap();
        assert_eq!(answer, NegotiationEvent::answer("g1", "sdp-a"));

        let candidate: NegotiationEvent =
            serde_json::from_str(r#"{"type":"candidate","sender":"h1","candidate":"c0"}"#).unwrap();
        assert_eq!(candidate, NegotiationEvent::candidate("h1", "c0"));

        let gathered: NegotiationEvent =
            serde_json::from_str(r#"{"type":"gathered","sender":"h1"}"#).unwrap();
        assert_eq!(gathered, NegotiationEvent::gathered("h1"));
    }

    #[test]
    fn serializes_with_camel_case_wire_names() {
        let json = serde_json::to_value(NegotiationEvent::offer("h1", "sdp")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "offer", "sender": "h1", "sessionDescription": "sdp"})
        );

        let json = serde_json::to_value(NegotiationEvent::gathered("g1")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "gathered", "sender": "g1"}));
    }

    #[test]
    fn rejects_missing_type_tag() {
        assert!(serde_json::from_str::<NegotiationEvent>(r#"{"sender":"h1"}"#).is_err());
    }

    #[test]
    fn rejects_unknown_type_tag() {
        assert!(
            serde_json::from_str::<NegotiationEvent>(r#"{"type":"renegotiate","sender":"h1"}"#)
                .is_err()
        );
    }

    #[test]
    fn rejects_missing_required_field() {
        assert!(serde_json::from_str::<NegotiationEvent>(r#"{"type":"offer","sender":"h1"}"#)
            .is_err());
    }

    #[test]
    fn rejects_extra_field() {
        assert!(serde_json::from_str::<NegotiationEvent>(
            r#"{"type":"gathered","sender":"h1","extra":true}"#
        )
        .is_err());
    }

    #[test]
    fn rejects_non_object_payload() {
        assert!(serde_json::from_str::<NegotiationEvent>(r#"["offer"]"#).is_err());
        assert!(serde_json::from_str::<NegotiationEvent>(r#""offer""#).is_err());
    }

    #[test]
    fn round_trips_verbatim_payloads() {
        let event = NegotiationEvent::candidate("h1", r#"{"candidate":"a=1","sdpMid":"0"}"#);
        let text = serde_json::to_string(&event).unwrap();
        let back: NegotiationEvent = serde_json::from_str(&text).unwrap();
        assert_eq!(back, event);
    }
}
