//! # syncpad server
//!
//! Realtime collaborative document server.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! syncpad
//!
//! # Run with custom config
//! syncpad --config /path/to/syncpad.toml
//!
//! # Run with environment variables
//! SYNCPAD_PORT=3001 SYNCPAD_HOST=0.0.0.0 syncpad
//! ```

mod config;
mod handlers;
mod metrics;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "syncpad=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;

    tracing::info!("Starting syncpad server on {}:{}", config.host, config.port);

    // Initialize metrics
    metrics::init_metrics();

    // Start the server
    handlers::run_server(config).await?;

    Ok(())
}
