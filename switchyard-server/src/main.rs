//! Switchyard Server - Headless Daemon
//!
//! A thin HTTP surface over the gateway engine:
//! - `POST /v1/chat/completions` routes a tenant's call (JSON or SSE)
//! - `/api/channels/*` probes channels and reads their metrics
//! - `/health` and `/metrics` for operators

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

mod api;
mod cli;
mod router;
mod state;
#[cfg(test)]
mod test_helpers;

use cli::Cli;
use state::AppState;
use switchyard_core::modules::{config::load_config, logger::init_logging};
use switchyard_core::proxy::prometheus::init_metrics;
use switchyard_core::Gateway;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.config)?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(level) = cli.log_level {
        config.server.log_level = level;
    }

    init_logging(&config.server.log_level)?;
    init_metrics()?;

    info!("🚀 Switchyard starting (config {})", cli.config.display());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let gateway = Gateway::builder(config).build()?;
    let health_task = gateway.start_background_tasks();

    let app = router::build_router(AppState::new(Arc::clone(&gateway)));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("🌐 Server listening on http://{}", addr);
    info!("🔀 Proxy endpoint at http://{}/v1/chat/completions", addr);
    info!("🔌 API available at http://{}/api/", addr);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    gateway.shutdown();
    if let Err(e) = health_task.await {
        tracing::warn!("Health task ended abnormally: {}", e);
    }
    info!("👋 Switchyard stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
