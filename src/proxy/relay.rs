//! Full-duplex relay between a client and its backend.
//!
//! Once a connection is identified, resolved, and dialed, the broker's only
//! remaining job is to move bytes in both directions until one side goes
//! away. Each direction owns a fixed buffer plus a count of carried bytes
//! ("rest"): while rest is nonzero the direction flushes before reading
//! again, so a fast source never outruns a slow destination and byte order
//! within a direction is preserved without unbounded buffering.
//!
//! The loop is readiness-driven with no timeout. Would-block results from
//! `try_read`/`try_write` are a normal pacing signal, never an error; the
//! relay terminates on the first orderly close or fatal I/O error in either
//! direction, tearing down both.

use std::io;

use tokio::io::Interest;
use tokio::net::TcpStream;
use tracing::debug;

/// Read chunk size per relay pass.
const CHUNK_SIZE: usize = 4096;

/// Outcome of one transfer pass over a single direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transfer {
    /// The direction made progress, or had nothing available this pass.
    Continue,
    /// A peer of this direction is gone; the whole relay must stop.
    Closed,
}

/// Buffered state for one relay direction.
struct Direction {
    buf: Box<[u8; CHUNK_SIZE]>,
    /// Bytes read but not yet written, always compacted to the buffer start.
    rest: usize,
    /// Total bytes delivered to the destination.
    transferred: u64,
}

impl Direction {
    fn new() -> Self {
        Self {
            buf: Box::new([0u8; CHUNK_SIZE]),
            rest: 0,
            transferred: 0,
        }
    }

    /// Advance this direction by at most one read and one write.
    ///
    /// Carried bytes are flushed before any new read. Would-block on read
    /// makes the pass a no-op; would-block on write leaves the bytes carried
    /// for a later pass.
    fn transfer(&mut self, src: &TcpStream, dst: &TcpStream) -> io::Result<Transfer> {
        let available = if self.rest == 0 {
            match src.try_read(&mut self.buf[..]) {
                Ok(0) => return Ok(Transfer::Closed),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(Transfer::Continue),
                Err(e) => return Err(e),
            }
        } else {
            self.rest
        };

        let written = match dst.try_write(&self.buf[..available]) {
            Ok(0) => return Ok(Transfer::Closed),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => 0,
            Err(e) => return Err(e),
        };

        self.rest = available - written;
        if self.rest > 0 {
            self.buf.copy_within(written..written + self.rest, 0);
        }
        self.transferred += written as u64;

        Ok(Transfer::Continue)
    }
}

/// Readiness to request from a socket, given its two roles in the relay.
///
/// A socket is read-polled only while its direction has no carried bytes,
/// and write-polled while it is the destination of a pending flush. `None`
/// means the socket needs nothing this pass.
fn interest(want_read: bool, want_write: bool) -> Option<Interest> {
    match (want_read, want_write) {
        (true, true) => Some(Interest::READABLE | Interest::WRITABLE),
        (true, false) => Some(Interest::READABLE),
        (false, true) => Some(Interest::WRITABLE),
        (false, false) => None,
    }
}

/// Relay bytes between `client` and `backend` until either peer closes or a
/// fatal I/O error occurs.
///
/// Returns the (client-to-backend, backend-to-client) byte totals. An
/// orderly close by either peer is a normal return; either way both
/// directions are torn down together and the caller drops both sockets.
/// Bytes still carried for the closing side's outbound direction are not
/// guaranteed delivered.
pub async fn relay(client: &TcpStream, backend: &TcpStream) -> io::Result<(u64, u64)> {
    // to_backend reads from the client, to_client reads from the backend.
    let mut to_backend = Direction::new();
    let mut to_client = Direction::new();

    debug!("Starting relay");

    loop {
        let client_interest = interest(to_backend.rest == 0, to_client.rest > 0);
        let backend_interest = interest(to_client.rest == 0, to_backend.rest > 0);

        // Block with no timeout until a socket we care about is ready. At
        // least one side always has an interest: a direction with carried
        // bytes arms write interest on its destination.
        tokio::select! {
            res = client.ready(client_interest.unwrap_or(Interest::READABLE)),
                if client_interest.is_some() =>
            {
                res?;
            }
            res = backend.ready(backend_interest.unwrap_or(Interest::READABLE)),
                if backend_interest.is_some() =>
            {
                res?;
            }
        }

        // Attempt both directions each pass; try_read/try_write report
        // would-block wherever the readiness did not apply.
        if to_backend.transfer(client, backend)? == Transfer::Closed {
            break;
        }
        if to_client.transfer(backend, client)? == Transfer::Closed {
            break;
        }
    }

    debug!(
        bytes_to_backend = to_backend.transferred,
        bytes_from_backend = to_client.transferred,
        "Connection closed by peer"
    );

    Ok((to_backend.transferred, to_client.transferred))
}
