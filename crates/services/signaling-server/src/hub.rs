//! Session hubs and the relay that owns them
//!
//! A [`SessionHub`] holds one session's live connection set and fans every
//! valid inbound envelope out to all of them, the sender included;
//! suppressing the echo is the receiving client's job. The [`Relay`] owns
//! the `host -> hub` map: a hub is created when the first participant
//! joins and evicted when the last one leaves. All mutation goes through
//! these two types; nothing else touches a connection set.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use pairlink_protocol::Envelope;

/// Identifier for one live transport connection
pub type ConnectionId = Uuid;

/// Broadcast hub for a single session
pub struct SessionHub {
    host: String,
    connections: RwLock<HashMap<ConnectionId, mpsc::Sender<String>>>,
}

impl SessionHub {
    fn new(host: &str) -> Self {
        Self {
            host: host.to_owned(),
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// The host identity this session is keyed by
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Register a connection's outbound channel
    ///
    /// No acknowledgement is sent and the connection count is unbounded.
    pub async fn connect(&self, id: ConnectionId, tx: mpsc::Sender<String>) {
        let mut connections = self.connections.write().await;
        connections.insert(id, tx);
        debug!(host = %self.host, connection = %id, total = connections.len(), "connection joined");
    }

    /// Remove a connection; returns how many remain
    pub async fn disconnect(&self, id: ConnectionId) -> usize {
        let mut connections = self.connections.write().await;
        connections.remove(&id);
        debug!(host = %self.host, connection = %id, total = connections.len(), "connection left");
        connections.len()
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Validate one inbound payload and fan it out
    ///
    /// A payload that fails the envelope schema is logged and dropped: no
    /// response, no broadcast, and the connection stays open.
    pub async fn handle_message(&self, raw: &str) {
        debug!(host = %self.host, "inbound payload: {raw}");
        let envelope = match serde_json::from_str::<Envelope>(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(host = %self.host, "dropping invalid payload: {e}");
                return;
            }
        };
        self.broadcast(&envelope).await;
    }

    /// Send an envelope to every connection in the session
    ///
    /// Best-effort per connection: a closed or backed-up channel is logged
    /// and skipped, never suppressing delivery to the rest. The connection
    /// set is snapshotted under the lock and the sends happen outside it,
    /// so fan-out is serialized with connect/disconnect but no socket I/O
    /// runs under the lock.
    pub async fn broadcast(&self, envelope: &Envelope) {
        let text = match serde_json::to_string(envelope) {
            Ok(text) => text,
            Err(e) => {
                warn!(host = %self.host, "failed to serialize envelope: {e}");
                return;
            }
        };
        let targets: Vec<(ConnectionId, mpsc::Sender<String>)> = {
            let connections = self.connections.read().await;
            connections
                .iter()
                .map(|(id, tx)| (*id, tx.clone()))
                .collect()
        };
        debug!(
            host = %self.host,
            kind = envelope.kind(),
            targets = targets.len(),
            "broadcasting envelope"
        );
        for (id, tx) in targets {
            if let Err(e) = tx.send(text.clone()).await {
                warn!(host = %self.host, connection = %id, "dropping delivery: {e}");
            }
        }
    }
}

/// Owner of every session hub in the process
///
/// Session-scoped state lives here and only here: hubs are reachable
/// exclusively through this map.
#[derive(Default)]
pub struct Relay {
    sessions: RwLock<HashMap<String, Arc<SessionHub>>>,
}

impl Relay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join a connection to the session for `host`, creating the hub on
    /// first join
    pub async fn join(
        &self,
        host: &str,
        id: ConnectionId,
        tx: mpsc::Sender<String>,
    ) -> Arc<SessionHub> {
        let hub = {
            let mut sessions = self.sessions.write().await;
            match sessions.get(host) {
                Some(hub) => hub.clone(),
                None => {
                    info!(%host, "session created");
                    let hub = Arc::new(SessionHub::new(host));
                    sessions.insert(host.to_owned(), hub.clone());
                    hub
                }
            }
        };
        hub.connect(id, tx).await;
        hub
    }

    /// Detach a connection, evicting the session once it empties
    ///
    /// Removal happens before any further broadcast can observe the
    /// connection, so a closed socket is never delivered to again.
    pub async fn leave(&self, host: &str, id: ConnectionId) {
        let hub = {
            let sessions = self.sessions.read().await;
            sessions.get(host).cloned()
        };
        let Some(hub) = hub else { return };
        if hub.disconnect(id).await == 0 {
            let mut sessions = self.sessions.write().await;
            // Re-check under the write lock: a participant may have joined
            // between the disconnect and the eviction.
            if let Some(hub) = sessions.get(host) {
                if hub.connection_count().await == 0 {
                    sessions.remove(host);
                    info!(%host, "session evicted");
                }
            }
        }
    }

    /// Look up the hub for `host`, if the session is live
    pub async fn session(&self, host: &str) -> Option<Arc<SessionHub>> {
        self.sessions.read().await.get(host).cloned()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
