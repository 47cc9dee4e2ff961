mod config;
mod routes;
mod upstream;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use client::logging;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::{ServerConfig, API_KEY_ENV};
use crate::routes::ServerState;
use crate::upstream::Upstream;

#[derive(Parser)]
#[command(name = "unveil-server", about = "Unveil analysis service -- relays captures to a vision model")]
struct Cli {
    /// Path to the server config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on (overrides the config file)
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = ServerConfig::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }

    logging::init_tracing(&config.logging, "unveil-server.log");
    if config.upstream.api_key.is_empty() {
        warn!("No API key configured; set {API_KEY_ENV} or upstream.api_key");
    }

    let max_upload_bytes = config.max_upload_mb * 1024 * 1024;
    let state = Arc::new(ServerState {
        upstream: Upstream::new(config.upstream.clone()),
        region: config.region.clone(),
    });
    let app = routes::router(state, max_upload_bytes);

    let listener = TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!("Listening on {} (model {})", config.bind, config.upstream.model);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("Server error")?;
    Ok(())
}
