//! Relay Daemon - knowledge-base chat relay with push notifications
//!
//! Forwards chat queries to the knowledge base, optionally rewrites answers
//! through the completion service, and sends chat push notifications.

use anyhow::Result;
use relayd::config::RelayConfig;
use relayd::{keepalive, server};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Relay Daemon v{} starting", env!("CARGO_PKG_VERSION"));

    let config = RelayConfig::load()?;
    let state = server::AppState::from_config(&config)?;

    let keep_alive = keepalive::spawn(&config);

    let result = server::run(state, config.port).await;

    if let Some(handle) = keep_alive {
        handle.abort();
    }
    result
}
