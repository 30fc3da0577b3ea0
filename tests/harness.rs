//! Test harness for broker integration tests.
//!
//! Provides helpers to spawn TCP echo backends and broker listeners on
//! ephemeral ports, plus identification-frame builders.

use std::io;
use std::net::{SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

use opbroker::frame::{FRAME_LEN, FRAME_MAGIC};
use opbroker::{Listener, ListenerConfig, StaticResolver};

#[allow(dead_code)]
pub struct TcpEchoBackend {
    pub addr: SocketAddr,
    pub connections: Arc<AtomicU64>,
    pub bytes_received: Arc<AtomicU64>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

#[allow(dead_code)]
impl TcpEchoBackend {
    pub async fn spawn() -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let connections = Arc::new(AtomicU64::new(0));
        let bytes_received = Arc::new(AtomicU64::new(0));

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let conn_clone = Arc::clone(&connections);
        let bytes_clone = Arc::clone(&bytes_received);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    accept_result = listener.accept() => {
                        match accept_result {
                            Ok((mut stream, _)) => {
                                conn_clone.fetch_add(1, Ordering::Relaxed);
                                let bytes = Arc::clone(&bytes_clone);
                                tokio::spawn(async move {
                                    let mut buf = vec![0u8; 8192];
                                    loop {
                                        match stream.read(&mut buf).await {
                                            Ok(0) => break,
                                            Ok(n) => {
                                                bytes.fetch_add(n as u64, Ordering::Relaxed);
                                                if stream.write_all(&buf[..n]).await.is_err() {
                                                    break;
                                                }
                                            }
                                            Err(_) => break,
                                        }
                                    }
                                });
                            }
                            Err(_) => break,
                        }
                    }
                    _ = &mut shutdown_rx => break,
                }
            }
        });

        Ok(Self {
            addr,
            connections,
            bytes_received,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn connection_count(&self) -> u64 {
        self.connections.load(Ordering::Relaxed)
    }
}

impl Drop for TcpEchoBackend {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

#[allow(dead_code)]
pub struct BrokerHandle {
    pub listen_addr: SocketAddr,
}

#[allow(dead_code)]
impl BrokerHandle {
    pub async fn spawn(resolver: StaticResolver) -> io::Result<Self> {
        let config = ListenerConfig::new("127.0.0.1:0".parse().unwrap());
        let listener = Listener::bind(config, Arc::new(resolver)).await?;
        let listen_addr = listener.local_addr()?;
        let listener = Arc::new(listener);

        tokio::spawn(async move {
            let _ = listener.run().await;
        });

        tokio::time::sleep(Duration::from_millis(10)).await;

        Ok(Self { listen_addr })
    }
}

#[allow(dead_code)]
pub fn v4(addr: SocketAddr) -> SocketAddrV4 {
    match addr {
        SocketAddr::V4(a) => a,
        SocketAddr::V6(_) => panic!("IPv4 address required"),
    }
}

#[allow(dead_code)]
pub fn single_route(id: &str, addr: SocketAddr) -> StaticResolver {
    let mut resolver = StaticResolver::new();
    resolver.insert(id, v4(addr));
    resolver
}

/// Build a full identification frame for `id`, zero-padded to frame size.
#[allow(dead_code)]
pub fn id_frame(id: &str) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    frame[..FRAME_MAGIC.len()].copy_from_slice(FRAME_MAGIC);
    frame[FRAME_MAGIC.len()..FRAME_MAGIC.len() + id.len()].copy_from_slice(id.as_bytes());
    frame
}

/// Connect to the broker and send the identification frame for `id`.
#[allow(dead_code)]
pub async fn connect_and_identify(addr: SocketAddr, id: &str) -> io::Result<TcpStream> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(&id_frame(id)).await?;
    Ok(stream)
}
