//! SolarForge Node — entry point.
//!
//! Starts the SolarForge node with configuration from a TOML file or defaults.

// Node accessors are exercised by tests only.
#![allow(dead_code)]

mod api;
mod commands;
mod config;
mod node;
mod state;
mod storage;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use config::{GatewayMode, SolarForgeConfig};
use node::SolarForgeNode;

/// SolarForge Node
#[derive(Parser, Debug)]
#[command(name = "solarforge-node", version, about = "SolarForge Node")]
struct Args {
    /// Path to the configuration file (TOML).
    #[arg(short, long, default_value = "solarforge.toml")]
    config: PathBuf,

    /// Override the API port.
    #[arg(long)]
    api_port: Option<u16>,

    /// Override the data directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override the settlement gateway URL.
    #[arg(long)]
    gateway_url: Option<String>,

    /// Settle forges in-process instead of on a ledger (development only).
    #[arg(long, conflicts_with = "gateway_url")]
    local_gateway: bool,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Generate a default config file and exit.
    #[arg(long)]
    init: bool,
}

fn init_tracing(config: &SolarForgeConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if config.json_logs() {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Handle --init flag
    if args.init {
        let config = SolarForgeConfig::default();
        config.save(&args.config)?;
        println!("wrote default config to {}", args.config.display());
        return Ok(());
    }

    // Load configuration
    let mut config = SolarForgeConfig::load(&args.config)?;

    // Apply CLI overrides
    if let Some(api_port) = args.api_port {
        config.api.port = api_port;
    }
    if let Some(ref data_dir) = args.data_dir {
        config.storage.data_dir = data_dir.clone();
    }
    if let Some(url) = args.gateway_url {
        config.gateway.mode = GatewayMode::Http;
        config.gateway.url = Some(url);
    }
    if args.local_gateway {
        config.gateway.mode = GatewayMode::Local;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    init_tracing(&config);
    tracing::info!("SolarForge Node v{}", env!("CARGO_PKG_VERSION"));

    // Create and start the node
    let mut node = SolarForgeNode::new(config)?;
    node.start().await?;

    // Set up graceful shutdown on SIGINT/SIGTERM
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        tracing::info!("received shutdown signal");
    };

    tokio::select! {
        result = node.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "node event loop error");
            }
        }
        _ = shutdown => {
            tracing::info!("initiating graceful shutdown");
        }
    }

    node.shutdown().await?;
    tracing::info!("SolarForge node exited cleanly");
    Ok(())
}
