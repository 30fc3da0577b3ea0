//! Per-connection tunnel pipeline.
//!
//! This module provides:
//! - TCP listener management and the accept loop
//! - Backend dialing
//! - Full-duplex connection relaying
//!
//! ## Architecture
//!
//! ```text
//! Client -> Listener -> Frame Reader -> Resolver -> Backend Dial -> Relay
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use opbroker::proxy::{Listener, ListenerConfig};
//! use opbroker::resolver::FileResolver;
//!
//! let resolver = Arc::new(FileResolver::new("operators.conf"));
//! let config = ListenerConfig::new("0.0.0.0:5500".parse()?);
//! let listener = Arc::new(Listener::bind(config, resolver).await?);
//! listener.run().await?;
//! ```

mod dial;
mod listener;
mod relay;

pub use dial::connect_backend;
pub use listener::{
    Listener, ListenerConfig, ListenerStats, PipelineError, DEFAULT_MAX_CONNECTIONS,
};
pub use relay::relay;
