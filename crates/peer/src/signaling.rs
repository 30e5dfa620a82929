//! WebSocket signaling client
//!
//! Speaks the relay's envelope protocol over one bidirectional WebSocket
//! per session. `connect` dials the relay's upgrade endpoint with the host
//! identity, splits the socket, and bridges it to a pair of channels: an
//! outbound envelope sink behind [`SignalingHandle`] and an inbound
//! envelope stream for the driver. Malformed inbound payloads are logged
//! and dropped; the connection stays open.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use pairlink_protocol::{Envelope, NegotiationEvent};

use crate::config::PeerConfig;
use crate::error::{Error, Result};

const CHANNEL_CAPACITY: usize = 64;

/// Outbound half of a signaling connection
///
/// Translates high-level intents into envelopes tagged with the local
/// username. Holds only a channel sender, so it is cheap to clone and hand
/// to the driver. `new` is public so tests and alternative transports can
/// wire the handle onto an in-memory channel.
#[derive(Debug, Clone)]
pub struct SignalingHandle {
    username: String,
    outbound: mpsc::Sender<Envelope>,
}

impl SignalingHandle {
    /// Wrap an outbound envelope channel for `username`
    pub fn new(username: impl Into<String>, outbound: mpsc::Sender<Envelope>) -> Self {
        Self {
            username: username.into(),
            outbound,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Push a batch of events to the session
    pub async fn send_events(&self, events: Vec<NegotiationEvent>) -> Result<()> {
        self.emit(Envelope::send(self.username.as_str(), events)).await
    }

    /// Ask the other participants for their full event log
    pub async fn get_events(&self) -> Result<()> {
        self.emit(Envelope::get(self.username.as_str())).await
    }

    async fn emit(&self, envelope: Envelope) -> Result<()> {
        debug!(kind = envelope.kind(), "sending envelope");
        self.outbound
            .send(envelope)
            .await
            .map_err(|_| Error::ChannelClosed)
    }
}

/// Connector for the relay's WebSocket endpoint
pub struct SignalingClient;

impl SignalingClient {
    /// Connect to the relay session identified by `host`
    ///
    /// Returns the outbound handle and the stream of validated inbound
    /// envelopes. The two bridge tasks live until the socket or the
    /// channels close.
    pub async fn connect(
        config: &PeerConfig,
        host: &str,
        username: &str,
    ) -> Result<(SignalingHandle, mpsc::Receiver<Envelope>)> {
        let url = config.broadcaster_url(host);
        let (socket, _response) = connect_async(&url).await?;
        info!(%url, %username, "signaling connection established");

        let (mut sink, mut stream) = socket.split();
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Envelope>(CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel::<Envelope>(CHANNEL_CAPACITY);

        tokio::spawn(async move {
            while let Some(envelope) = outbound_rx.recv().await {
                let text = match serde_json::to_string(&envelope) {
                    Ok(text) => text,
                    Err(e) => {
                        error!("failed to serialize envelope: {e}");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text)).await {
                    debug!("signaling send failed: {e}");
                    break;
                }
            }
        });

        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        debug!("signaling receive failed: {e}");
                        break;
                    }
                };
                let envelope = match serde_json::from_str::<Envelope>(&text) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        warn!("dropping malformed envelope: {e}");
                        continue;
                    }
                };
                if inbound_tx.send(envelope).await.is_err() {
                    break;
                }
            }
        });

        Ok((SignalingHandle::new(username, outbound_tx), inbound_rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handle_tags_envelopes_with_the_local_username() {
        let (tx, mut rx) = mpsc::channel(4);
        let handle = SignalingHandle::new("g1", tx);

        handle.get_events().await.unwrap();
        handle
            .send_events(vec![NegotiationEvent::gathered("g1")])
            .await
            .unwrap();

        assert_eq!(rx.recv().await, Some(Envelope::get("g1")));
        assert_eq!(
            rx.recv().await,
            Some(Envelope::send("g1", vec![NegotiationEvent::gathered("g1")]))
        );
    }

    #[tokio::test]
    async fn handle_reports_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = SignalingHandle::new("g1", tx);
        assert!(matches!(
            handle.get_events().await,
            Err(Error::ChannelClosed)
        ));
    }
}
