//! Signaling relay binary entry point
//!
//! Runs the JSON-RPC 2.0 WebSocket relay that call clients announce to and
//! route offers, answers, candidates and hang-ups through.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default address (0.0.0.0:8080)
//! cargo run --bin signaling_relay
//!
//! # Custom address and verbose relay logs
//! cargo run --bin signaling_relay -- \
//!   --listen 127.0.0.1:9000 \
//!   --log-filter peercall=debug,info
//! ```

use clap::Parser;
use peercall::SignalingRelay;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// PeerCall signaling relay
///
/// Forwards call signaling between announced peers over WebSocket.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:8080", env = "PEERCALL_RELAY_LISTEN")]
    listen: SocketAddr,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info", env = "PEERCALL_RELAY_LOG")]
    log_filter: String,
}

fn init_tracing(default_filter: &str) -> anyhow::Result<()> {
    // RUST_LOG wins over the command line
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)?,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_filter)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %args.listen,
        "PeerCall signaling relay starting"
    );

    let relay = SignalingRelay::bind(args.listen).await?;
    let handle = relay.serve()?;

    info!("Relay running on {}. Press Ctrl+C to shutdown.", handle.url());
    tokio::signal::ctrl_c().await?;

    info!("Ctrl+C received, shutting down");
    handle.shutdown().await;
    Ok(())
}
