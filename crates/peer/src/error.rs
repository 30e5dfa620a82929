//! Error types for peer-side negotiation

use thiserror::Error;

/// Result type alias for peer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving a negotiation
#[derive(Debug, Error)]
pub enum Error {
    /// The connection capability failed an operation
    #[error("peer connection error: {0}")]
    Connection(String),

    /// A required event was absent when an action ran
    ///
    /// Unreachable through guarded dispatch; surfaces only when an effect
    /// is executed against a log that no longer satisfies its guard.
    #[error("missing {0} event in log")]
    MissingEvent(&'static str),

    /// Signaling transport failure
    #[error("signaling transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// Wire schema violation
    #[error("protocol error: {0}")]
    Protocol(#[from] pairlink_protocol::ProtocolError),

    /// Outbound serialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The signaling channel closed underneath us
    #[error("signaling channel closed")]
    ChannelClosed,
}
