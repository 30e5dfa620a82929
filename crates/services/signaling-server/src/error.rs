//! Error types for the signaling relay

use thiserror::Error;

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors the relay can surface to its caller
///
/// Per-connection failures (a malformed payload, a dead socket during
/// fan-out) are handled where they occur, logged and dropped, and never
/// reach this type.
#[derive(Debug, Error)]
pub enum Error {
    /// Listener or socket I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket handshake or framing error
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}
