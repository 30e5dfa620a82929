//! Signaling relay binary entry point
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default address
//! cargo run -p pairlink-signaling-server
//!
//! # Custom bind address, verbose relay logging
//! RUST_LOG=pairlink_signaling_server=debug \
//!   cargo run -p pairlink-signaling-server -- --bind-address 127.0.0.1:9000
//! ```

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pairlink_signaling_server::{ServerConfig, SignalingServer};

/// Pairlink signaling relay
///
/// Accepts WebSocket upgrades at `/broadcaster?host=<session>` and fans
/// every valid signaling envelope out to all participants of the session.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind the WebSocket listener on
    #[arg(long, default_value = "0.0.0.0:8080", env = "PAIRLINK_BIND_ADDRESS")]
    bind_address: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig {
        bind_address: args.bind_address,
    };
    let server = SignalingServer::bind(&config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
        }
    }

    Ok(())
}
