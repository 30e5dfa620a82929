//! Per-session broadcast relay for pairlink signaling
//!
//! Participants join a session by upgrading a WebSocket with the session's
//! host identity; every valid envelope a participant sends is fanned out
//! to every connection in that session, the sender included. The relay
//! validates envelopes against the wire schema and nothing more; it never
//! interprets negotiation semantics.

mod config;
mod error;
mod hub;
mod server;

pub use config::ServerConfig;
pub use error::{Error, Result};
pub use hub::{ConnectionId, Relay, SessionHub};
pub use server::SignalingServer;
