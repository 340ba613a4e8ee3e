//! Clearnode faucet server.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────┐
//!                         │                CLEARNODE FAUCET              │
//!                         │                                              │
//!   POST /requestTokens   │  ┌─────────┐     ┌───────────────────────┐   │
//!   ──────────────────────┼─▶│  http   │────▶│   ClearnodeClient     │   │
//!                         │  │ server  │     │  auth · correlator    │   │
//!   GET /info             │  └─────────┘     └──────────┬────────────┘   │
//!   ──────────────────────┼─▶                           │ one WebSocket  │
//!                         │                             ▼                │
//!                         │                     ┌──────────────┐         │      Clearnode
//!                         │                     │  connection  │◀────────┼────▶   node
//!                         │                     │ reader task  │         │
//!                         │                     └──────────────┘         │
//!                         │  config · observability · lifecycle          │
//!                         └──────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use clearnode_faucet::clearnode::{ClearnodeClient, Identities};
use clearnode_faucet::config::load_config;
use clearnode_faucet::http::HttpServer;
use clearnode_faucet::lifecycle::{spawn_signal_handler, Shutdown};
use clearnode_faucet::observability::{self, metrics};

#[derive(Parser, Debug)]
#[command(name = "clearnode-faucet", version, about = "Token faucet backed by a Clearnode ledger")]
struct Cli {
    /// Path to a TOML configuration file. Environment variables override it.
    #[arg(short, long, env = "FAUCET_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    observability::init_tracing(&config.observability.log_level, config.observability.log_format);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "clearnode-faucet starting");

    tracing::info!(
        bind_address = %config.server.bind_address,
        clearnode_url = %config.clearnode.url,
        token_symbol = %config.faucet.token_symbol,
        standard_tip_amount = %config.faucet.standard_tip_amount,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let identities = Identities::from_env()?;
    let client = ClearnodeClient::new(identities, config.client_config())?;
    tracing::info!(faucet_address = %client.address(), "Faucet identity loaded");

    client.ensure_connected().await?;
    client.ensure_operational().await?;
    tracing::info!("Connected to Clearnode and operational");

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    let server = HttpServer::new(&config, client.clone());
    server.run(listener, shutdown.signalled()).await?;

    client.close().await?;
    tracing::info!("Shutdown complete");
    Ok(())
}
