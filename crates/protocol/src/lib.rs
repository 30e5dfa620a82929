//! Wire schema and event log for pairlink signaling
//!
//! This crate is the leaf of the workspace: it defines the negotiation
//! events exchanged between peers, the relay-level envelopes that carry
//! them, and the append-only event log a negotiation reasons over. It has
//! no opinion on transports or connection objects; payloads such as
//! session descriptions and ICE candidates are opaque strings here.

mod envelope;
mod error;
mod event;
mod log;

pub use envelope::Envelope;
pub use error::{ProtocolError, Result};
pub use event::NegotiationEvent;
pub use log::EventLog;
