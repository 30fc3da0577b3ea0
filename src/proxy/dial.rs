//! Backend connection establishment.

use std::io;
use std::net::{SocketAddr, SocketAddrV4};

use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Open the TCP connection to a resolved backend address.
///
/// One attempt only: no retry, no backoff, and no timeout beyond the
/// operating environment's default. On failure the caller closes the client
/// socket and gives the connection up; no other address is tried.
pub async fn connect_backend(addr: SocketAddrV4) -> io::Result<TcpStream> {
    debug!(backend_addr = %addr, "Connecting to backend");

    match TcpStream::connect(SocketAddr::V4(addr)).await {
        Ok(stream) => Ok(stream),
        Err(e) => {
            warn!(backend_addr = %addr, error = %e, "Backend connect failed");
            Err(e)
        }
    }
}
