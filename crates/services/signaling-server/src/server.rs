//! WebSocket server for the relay
//!
//! One task per connection: the upgrade handshake extracts the session's
//! host identity from the `host` query parameter (rejecting the upgrade
//! with a client error when it is missing), the connection registers with
//! the relay, a forward task drains its outbound channel into the socket,
//! and the read loop feeds inbound payloads to the session hub. On close
//! or error the connection is removed from the session before any further
//! broadcast.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{StatusCode, Uri};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::hub::Relay;

const OUTBOUND_CAPACITY: usize = 64;

/// The relay's WebSocket listener
pub struct SignalingServer {
    listener: TcpListener,
    relay: Arc<Relay>,
}

impl SignalingServer {
    /// Bind the listener configured in `config`
    pub async fn bind(config: &ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind(&config.bind_address).await?;
        Ok(Self {
            listener,
            relay: Arc::new(Relay::new()),
        })
    }

    /// The bound address (useful with a port of 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared handle to the relay state
    pub fn relay(&self) -> Arc<Relay> {
        Arc::clone(&self.relay)
    }

    /// Accept connections until the task is dropped
    pub async fn run(self) -> Result<()> {
        info!(address = %self.local_addr()?, "signaling relay listening");
        loop {
            let (stream, address) = self.listener.accept().await?;
            let relay = Arc::clone(&self.relay);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, relay).await {
                    debug!(%address, "connection ended: {e}");
                }
            });
        }
    }
}

/// Pull the session host identity out of the upgrade request query
fn host_from_query(uri: &Uri) -> Option<String> {
    let query = uri.query()?;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == "host" && !value.is_empty()).then(|| value.to_string())
    })
}

fn missing_host_response() -> ErrorResponse {
    let mut response = ErrorResponse::new(Some("missing \"host\" query parameter".to_string()));
    *response.status_mut() = StatusCode::BAD_REQUEST;
    response
}

async fn handle_connection(stream: TcpStream, relay: Arc<Relay>) -> Result<()> {
    let address = stream.peer_addr()?;
    let mut host = None;
    let socket = accept_hdr_async(stream, |request: &Request, response: Response| {
        match host_from_query(request.uri()) {
            Some(value) => {
                host = Some(value);
                Ok(response)
            }
            None => Err(missing_host_response()),
        }
    })
    .await?;
    // The callback only accepts the upgrade after setting the host.
    let Some(host) = host else { return Ok(()) };

    let id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);
    let hub = relay.join(&host, id, tx).await;
    info!(%host, connection = %id, %address, "participant joined session");

    let (mut sink, mut stream) = socket.split();
    let forward = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => hub.handle_message(&text).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(%host, connection = %id, "websocket error: {e}");
                break;
            }
        }
    }

    relay.leave(&host, id).await;
    forward.abort();
    info!(%host, connection = %id, "participant left session");
    Ok(())
}
