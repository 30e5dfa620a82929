//! Peer configuration

/// Configuration for one participant
///
/// ICE servers are handed to whatever builds the concrete connection
/// object; this crate only carries them.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// STUN/TURN server URLs for the connection object
    pub ice_servers: Vec<String>,
    /// Base URL of the signaling relay
    pub signaling_url: String,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![
                "stun:stun1.l.google.com:19302".to_string(),
                "stun:stun2.l.google.com:19302".to_string(),
            ],
            signaling_url: "ws://localhost:8080".to_string(),
        }
    }
}

impl PeerConfig {
    /// Override the signaling relay URL
    pub fn with_signaling_url(mut self, url: impl Into<String>) -> Self {
        self.signaling_url = url.into();
        self
    }

    /// The session upgrade URL for a given host identity
    pub fn broadcaster_url(&self, host: &str) -> String {
        format!(
            "{}/broadcaster?host={host}",
            self.signaling_url.trim_end_matches('/')
        )
    }
}
