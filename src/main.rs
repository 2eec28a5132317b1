//! Outbound URL-fetch gateway.
//!
//! Accepts a client-supplied URL on `GET /fetch`, runs it through an
//! ordered SSRF-defense pipeline, and relays the response of targets that
//! clear every check.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌────────────────────────────────────────────────┐
//!                    │                 FETCH GATEWAY                  │
//!                    │                                                │
//!  GET /fetch?url=.. │  ┌──────────┐   ┌───────────┐   ┌───────────┐  │
//!  ──────────────────┼─▶│ security │──▶│ validate  │──▶│   fetch   │──┼──▶ Upstream
//!                    │  │rate limit│   │ pipeline  │   │   guard   │  │    origin
//!                    │  └──────────┘   └───────────┘   └─────┬─────┘  │
//!                    │                                       │        │
//!  body + type       │  ┌──────────────────────────────┐     │        │
//!  ◀─────────────────┼──│ http (relay / structured err)│◀────┘        │
//!                    │  └──────────────────────────────┘              │
//!                    │                                                │
//!                    │  config (load-time, validated)                 │
//!                    │  observability (tracing, metrics)              │
//!                    └────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use fetch_gateway::config::{load_config, GatewayConfig};
use fetch_gateway::observability::{logging, metrics};
use fetch_gateway::GatewayServer;

#[derive(Parser)]
#[command(name = "fetch-gateway")]
#[command(about = "SSRF-hardened outbound URL-fetch gateway", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init(&config.observability.log_level);

    tracing::info!("fetch-gateway v0.1.0 starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        rate_limit_enabled = config.rate_limit.enabled,
        fetch_timeout_secs = config.fetch.timeout_secs,
        max_response_bytes = config.fetch.max_response_bytes,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(
        address = %local_addr,
        "Listening for connections"
    );

    let server = GatewayServer::new(config)?;
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
