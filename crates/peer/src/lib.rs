//! Peer-side negotiation for pairlink
//!
//! A participant joins a session with a `host` identity and a `username`;
//! the participant whose username equals the host identity plays the
//! offering role, everyone else answers. This crate drives one
//! participant's connection object through that exchange:
//!
//! - [`machine`]: the pure negotiation state machine with explicit states,
//!   guarded commands, effects as data.
//! - [`connection`]: the abstract peer-connection capability the driver
//!   executes effects against.
//! - [`driver`]: the async shell that owns the machine, awaits connection
//!   operations, and reacts to signaling traffic.
//! - [`signaling`]: the WebSocket client speaking the relay's envelope
//!   protocol.

pub mod config;
pub mod connection;
pub mod driver;
mod error;
pub mod machine;
pub mod signaling;

pub use config::PeerConfig;
pub use connection::{ConnectionEvent, PeerConnectionApi};
pub use driver::NegotiationDriver;
pub use error::{Error, Result};
pub use machine::{Command, Effect, GatherPhase, NegotiationMachine, NegotiationState};
pub use signaling::{SignalingClient, SignalingHandle};
