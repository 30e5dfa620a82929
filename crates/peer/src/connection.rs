//! Abstract peer-connection capability
//!
//! The negotiation core never touches a real connection object. The
//! collaborator layer supplies something implementing [`PeerConnectionApi`]
//! and forwards its candidate callbacks as [`ConnectionEvent`]s; session
//! descriptions and candidates cross this seam as opaque strings.

use async_trait::async_trait;

use crate::error::Result;

/// Operations the negotiation driver needs from a connection object
#[async_trait]
pub trait PeerConnectionApi: Send + Sync {
    /// Create a session description proposing a connection
    async fn create_offer(&self) -> Result<String>;

    /// Create a session description accepting the current remote offer
    async fn create_answer(&self) -> Result<String>;

    /// Apply a session description as the local half of the connection
    async fn set_local_description(&self, description: &str) -> Result<()>;

    /// Apply a session description as the remote half of the connection
    async fn set_remote_description(&self, description: &str) -> Result<()>;

    /// Feed one remote ICE candidate into the connection
    async fn add_ice_candidate(&self, candidate: &str) -> Result<()>;
}

/// Callback traffic from the connection object
///
/// The collaborator translates its candidate callbacks into these and
/// pushes them into the driver's connection-event channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The connection produced one local ICE candidate
    Candidate(String),
    /// Local candidate gathering finished
    GatheringComplete,
}
