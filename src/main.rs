//! opbroker
//!
//! TCP tunnel broker.
//!
//! This service:
//! - Accepts TCP connections on a configured port
//! - Reads a fixed-size identification frame from each client
//! - Resolves the declared identifier against the operator table
//! - Dials the operator's backend and relays bytes both ways
//!
//! Individual connection failures are contained; only listener-level
//! failures (bind, accept) terminate the process.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use opbroker::config::Config;
use opbroker::proxy::{Listener, ListenerConfig};
use opbroker::resolver::FileResolver;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to OPBROKER_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting opbroker");
    info!(
        listen_addr = %config.listen_addr,
        operators_file = %config.operators_file.display(),
        max_connections = config.max_connections,
        "Configuration loaded"
    );

    let resolver = Arc::new(FileResolver::new(&config.operators_file));

    let mut listener_config = ListenerConfig::new(config.listen_addr);
    listener_config.max_connections = config.max_connections;

    let listener = Arc::new(Listener::bind(listener_config, resolver).await?);

    // Runs until a listener-level failure; per-connection failures never
    // reach here.
    listener.run().await?;

    Ok(())
}
