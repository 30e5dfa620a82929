//! Relay integration tests over real sockets
//!
//! Each test binds the server on an ephemeral port and talks to it with
//! real WebSocket clients.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use pairlink_signaling_server::{Relay, ServerConfig, SignalingServer};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

// =============================================================================
// Harness
// =============================================================================

async fn start_server() -> (SocketAddr, Arc<Relay>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .try_init();
    let config = ServerConfig {
        bind_address: "127.0.0.1:0".to_string(),
    };
    let server = SignalingServer::bind(&config).await.expect("bind server");
    let address = server.local_addr().expect("local addr");
    let relay = server.relay();
    tokio::spawn(server.run());
    (address, relay)
}

async fn join(address: SocketAddr, host: &str) -> Client {
    let (socket, _response) = connect_async(format!("ws://{address}/broadcaster?host={host}"))
        .await
        .expect("websocket upgrade");
    socket
}

/// Wait until the server side has registered `count` connections
async fn wait_for_connections(relay: &Relay, host: &str, count: usize) {
    for _ in 0..200 {
        if let Some(hub) = relay.session(host).await {
            if hub.connection_count().await == count {
                return;
            }
        } else if count == 0 {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {count} connections on {host:?}");
}

async fn recv_text(client: &mut Client) -> String {
    loop {
        let frame = timeout(WAIT, client.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = frame {
            return text;
        }
    }
}

// =============================================================================
// Fan-out
// =============================================================================

#[tokio::test]
async fn broadcasts_to_every_participant_including_sender() {
    let (address, relay) = start_server().await;
    let mut c1 = join(address, "h1").await;
    let mut c2 = join(address, "h1").await;
    let mut c3 = join(address, "h1").await;
    wait_for_connections(&relay, "h1", 3).await;

    let payload = r#"{"type":"send","sender":"h1","events":[{"type":"offer","sender":"h1","sessionDescription":"sdp"}]}"#;
    c1.send(Message::Text(payload.to_string())).await.unwrap();

    assert_eq!(recv_text(&mut c2).await, payload);
    assert_eq!(recv_text(&mut c3).await, payload);
    // The sender gets the echo too; suppression is the client's job.
    assert_eq!(recv_text(&mut c1).await, payload);
}

#[tokio::test]
async fn sessions_do_not_leak_across_hosts() {
    let (address, relay) = start_server().await;
    let mut c1 = join(address, "h1").await;
    let mut other = join(address, "h2").await;
    wait_for_connections(&relay, "h1", 1).await;
    wait_for_connections(&relay, "h2", 1).await;

    c1.send(Message::Text(r#"{"type":"get","sender":"g1"}"#.to_string()))
        .await
        .unwrap();

    assert_eq!(recv_text(&mut c1).await, r#"{"type":"get","sender":"g1"}"#);
    let stray = timeout(Duration::from_millis(300), other.next()).await;
    assert!(stray.is_err(), "envelope crossed sessions: {stray:?}");
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn malformed_payloads_are_dropped_silently() {
    let (address, relay) = start_server().await;
    let mut c1 = join(address, "h1").await;
    let mut c2 = join(address, "h1").await;
    wait_for_connections(&relay, "h1", 2).await;

    for bad in [
        "not json",
        r#"{"sender":"g1"}"#,
        r#"{"type":"send","sender":"g1"}"#,
        r#"{"type":"get","sender":"g1","extra":true}"#,
    ] {
        c1.send(Message::Text(bad.to_string())).await.unwrap();
    }
    let valid = r#"{"type":"get","sender":"g1"}"#;
    c1.send(Message::Text(valid.to_string())).await.unwrap();

    // The first thing anyone receives is the valid envelope; the invalid
    // payloads produced nothing and the connection stayed open.
    assert_eq!(recv_text(&mut c2).await, valid);
}

#[tokio::test]
async fn upgrade_without_host_is_rejected() {
    let (address, _relay) = start_server().await;
    let result = connect_async(format!("ws://{address}/broadcaster")).await;
    match result {
        Err(WsError::Http(response)) => assert_eq!(response.status(), 400),
        other => panic!("expected HTTP 400 rejection, got {other:?}"),
    }
}

// =============================================================================
// Disconnect handling
// =============================================================================

#[tokio::test]
async fn disconnected_socket_is_removed_and_session_evicted() {
    let (address, relay) = start_server().await;
    let mut c1 = join(address, "h1").await;
    let mut c2 = join(address, "h1").await;
    wait_for_connections(&relay, "h1", 2).await;

    c2.close(None).await.unwrap();
    wait_for_connections(&relay, "h1", 1).await;

    // Fan-out still works for the remaining participant.
    let payload = r#"{"type":"get","sender":"g1"}"#;
    c1.send(Message::Text(payload.to_string())).await.unwrap();
    assert_eq!(recv_text(&mut c1).await, payload);

    c1.close(None).await.unwrap();
    wait_for_connections(&relay, "h1", 0).await;
    assert_eq!(relay.session_count().await, 0);
}
