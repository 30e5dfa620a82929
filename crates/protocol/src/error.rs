//! Error types for wire decoding

use thiserror::Error;

/// Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while decoding inbound wire data
///
/// Decoding is strict: a payload that is not a JSON object, lacks a string
/// `type` tag, carries an unknown tag, or has missing or extra fields is
/// rejected as a whole. Receivers log and drop; these errors never travel
/// back over the wire.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Payload was not valid JSON, or a field failed validation
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Payload was valid JSON but not an object
    #[error("payload is not a JSON object")]
    NotAnObject,

    /// The `type` tag is absent or not a string
    #[error("missing or non-string \"type\" tag")]
    MissingType,

    /// The `type` tag named no known message
    #[error("unknown message type \"{0}\"")]
    UnknownType(String),
}
