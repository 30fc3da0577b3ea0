//! Broker configuration.
//!
//! Configuration is resolved once at startup and handed to the components
//! that need it; there is no ambient global state.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::proxy::DEFAULT_MAX_CONNECTIONS;

/// Broker configuration (env-driven).
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the broker listens on for client connections.
    pub listen_addr: SocketAddr,

    /// Path to the operator routing table.
    pub operators_file: PathBuf,

    /// Maximum concurrent client connections.
    pub max_connections: usize,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let listen_addr = std::env::var("OPBROKER_LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:5500".to_string())
            .parse()
            .context("OPBROKER_LISTEN_ADDR must be a socket address (host:port).")?;

        let operators_file = std::env::var("OPBROKER_OPERATORS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("operators.conf"));

        let max_connections: usize = std::env::var("OPBROKER_MAX_CONNECTIONS")
            .ok()
            .map(|v| v.parse())
            .transpose()
            .context("OPBROKER_MAX_CONNECTIONS must be an integer.")?
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);

        let log_level = std::env::var("OPBROKER_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            listen_addr,
            operators_file,
            max_connections,
            log_level,
        })
    }
}
