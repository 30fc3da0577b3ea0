//! TCP listener and per-connection pipeline.
//!
//! The supervisor accepts client connections and drives one independent
//! pipeline per connection: read the identification frame, resolve the
//! identifier to a backend address, dial the backend, then relay bytes both
//! ways until either side goes away. Every stage failure moves the
//! connection straight to closed, with no retries between stages.
//!
//! Failures are contained to their own connection: a rejected client
//! observes only an unexplained close, and neither a slow peer nor a dead
//! backend ever delays another connection or the accept loop. An accept
//! failure, by contrast, is fatal to the whole listener.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn, Instrument};

use crate::frame::{self, FrameError};
use crate::proxy::dial::connect_backend;
use crate::proxy::relay::relay;
use crate::resolver::{Resolve, ResolveError};

/// Default maximum concurrent connections per listener.
pub const DEFAULT_MAX_CONNECTIONS: usize = 10000;

/// Configuration for a listener.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
}

impl ListenerConfig {
    /// Create a new listener configuration.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

/// Statistics for a listener.
#[derive(Debug, Default)]
pub struct ListenerStats {
    /// Total connections accepted.
    pub connections_accepted: AtomicU64,
    /// Connections currently being handled.
    pub connections_active: AtomicU64,
    /// Total connections closed.
    pub connections_closed: AtomicU64,
    /// Connections dropped because no handler could be scheduled.
    pub connections_rejected: AtomicU64,
    /// Identification frames rejected (short, bad magic, bad identifier).
    pub frames_rejected: AtomicU64,
    /// Identifier resolution failures.
    pub resolve_failed: AtomicU64,
    /// Backend dial failures.
    pub dial_failed: AtomicU64,
    /// Bytes relayed from clients to backends.
    pub bytes_to_backend: AtomicU64,
    /// Bytes relayed from backends to clients.
    pub bytes_from_backend: AtomicU64,
}

/// A connection pipeline failure, contained to that connection.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The identification frame was short or invalid.
    #[error("identification failed: {0}")]
    Frame(#[from] FrameError),

    /// The identifier did not resolve to a backend address.
    #[error("resolution failed: {0}")]
    Resolve(#[from] ResolveError),

    /// The backend could not be dialed.
    #[error("backend dial failed: {0}")]
    Dial(#[source] io::Error),

    /// The relay hit a fatal I/O error.
    #[error("relay failed: {0}")]
    Relay(#[source] io::Error),
}

/// A TCP listener for the tunnel broker.
pub struct Listener {
    /// The TCP listener.
    listener: TcpListener,
    /// Resolver mapping identifiers to backend addresses.
    resolver: Arc<dyn Resolve>,
    /// Connection semaphore for limiting concurrent connections.
    conn_semaphore: Arc<Semaphore>,
    /// Statistics.
    stats: Arc<ListenerStats>,
}

impl Listener {
    /// Create a new listener.
    pub async fn bind(config: ListenerConfig, resolver: Arc<dyn Resolve>) -> io::Result<Self> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        let local_addr = listener.local_addr()?;

        info!(
            bind_addr = %local_addr,
            max_connections = config.max_connections,
            "Listener bound"
        );

        Ok(Self {
            conn_semaphore: Arc::new(Semaphore::new(config.max_connections)),
            listener,
            resolver,
            stats: Arc::new(ListenerStats::default()),
        })
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Get listener statistics.
    pub fn stats(&self) -> &ListenerStats {
        &self.stats
    }

    /// Run the listener, accepting and handling connections.
    ///
    /// Each accepted connection is handed to an independently scheduled
    /// handler; the loop itself never performs relay work. An accept failure
    /// propagates to the caller and terminates the whole listener; it is not
    /// retried.
    pub async fn run(self: Arc<Self>) -> io::Result<()> {
        let local_addr = self.listener.local_addr()?;
        info!(bind_addr = %local_addr, "Listener started");

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!(error = %e, "Accept failed");
                    return Err(e);
                }
            };

            // A connection we cannot schedule a handler for is dropped; the
            // accept loop keeps going.
            let permit = match self.conn_semaphore.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    self.stats
                        .connections_rejected
                        .fetch_add(1, Ordering::Relaxed);
                    warn!(peer_addr = %peer_addr, "Connection dropped: max connections reached");
                    continue;
                }
            };

            self.stats
                .connections_accepted
                .fetch_add(1, Ordering::Relaxed);
            self.stats.connections_active.fetch_add(1, Ordering::Relaxed);
            info!(peer_addr = %peer_addr, "Client connected");

            let listener = Arc::clone(&self);
            let stats = Arc::clone(&self.stats);

            tokio::spawn(
                async move {
                    match listener.handle_connection(stream).await {
                        Ok(()) => debug!("Connection finished"),
                        Err(e) => debug!(error = %e, "Connection failed"),
                    }

                    stats.connections_active.fetch_sub(1, Ordering::Relaxed);
                    stats.connections_closed.fetch_add(1, Ordering::Relaxed);
                    drop(permit);
                }
                .instrument(tracing::info_span!("connection", peer = %peer_addr)),
            );
        }
    }

    /// Drive one connection's pipeline to completion.
    ///
    /// Both sockets are owned by this call and closed on every exit path.
    /// A rejected client gets no protocol-level error message.
    async fn handle_connection(&self, mut client: TcpStream) -> Result<(), PipelineError> {
        let id = match frame::read_frame(&mut client).await {
            Ok(id) => id,
            Err(e) => {
                self.stats.frames_rejected.fetch_add(1, Ordering::Relaxed);
                return Err(e.into());
            }
        };
        debug!(id = %id, "Client identified");

        let backend_addr = match self.resolver.resolve(&id) {
            Ok(addr) => addr,
            Err(e) => {
                self.stats.resolve_failed.fetch_add(1, Ordering::Relaxed);
                warn!(id = %id, error = %e, "Resolution failed");
                return Err(e.into());
            }
        };
        debug!(id = %id, backend_addr = %backend_addr, "Identifier resolved");

        let backend = match connect_backend(backend_addr).await {
            Ok(stream) => stream,
            Err(e) => {
                self.stats.dial_failed.fetch_add(1, Ordering::Relaxed);
                return Err(PipelineError::Dial(e));
            }
        };

        let (bytes_to_backend, bytes_from_backend) = relay(&client, &backend)
            .await
            .map_err(PipelineError::Relay)?;

        self.stats
            .bytes_to_backend
            .fetch_add(bytes_to_backend, Ordering::Relaxed);
        self.stats
            .bytes_from_backend
            .fetch_add(bytes_from_backend, Ordering::Relaxed);

        info!(
            bytes_to_backend = bytes_to_backend,
            bytes_from_backend = bytes_from_backend,
            "Relay finished"
        );

        Ok(())
    }
}
