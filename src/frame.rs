//! Identification frame parsing.
//!
//! Every client opens its connection by sending a fixed-size identification
//! frame: a 3-byte magic marker followed by the operator identifier, padded
//! out to 250 bytes. The broker consumes the frame and never forwards it to
//! the backend.
//!
//! This read happens in the pre-relay, sequential phase of a connection: the
//! frame either arrives whole or the attempt fails. A peer that closes or
//! errors mid-frame is rejected, not retried.

use std::io;
use std::str::Utf8Error;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Total size of the identification frame in bytes.
pub const FRAME_LEN: usize = 250;

/// Magic marker at the start of every identification frame.
pub const FRAME_MAGIC: &[u8; 3] = b"ID:";

/// Maximum identifier length in bytes, excluding the terminator.
pub const MAX_ID_LEN: usize = 16;

/// Failure to read or validate an identification frame.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The frame did not arrive in full, or the read failed outright.
    #[error("frame read failed: {0}")]
    Io(#[from] io::Error),

    /// The frame does not start with the magic marker.
    #[error("invalid magic in identification frame")]
    InvalidMagic,

    /// The identifier field is not valid UTF-8.
    #[error("identifier is not valid UTF-8: {0}")]
    InvalidIdentifier(#[from] Utf8Error),
}

/// Read and validate an identification frame, returning the identifier.
///
/// All [`FRAME_LEN`] bytes are read before any interpretation. The magic
/// marker must match in full. The identifier is the text after the marker,
/// up to the first NUL byte or [`MAX_ID_LEN`] bytes, whichever comes first.
pub async fn read_frame<R: AsyncRead + Unpin>(stream: &mut R) -> Result<String, FrameError> {
    let mut buf = [0u8; FRAME_LEN];
    stream.read_exact(&mut buf).await?;

    if &buf[..FRAME_MAGIC.len()] != FRAME_MAGIC {
        return Err(FrameError::InvalidMagic);
    }

    let field = &buf[FRAME_MAGIC.len()..FRAME_MAGIC.len() + MAX_ID_LEN];
    let len = field.iter().position(|&b| b == 0).unwrap_or(MAX_ID_LEN);
    let id = std::str::from_utf8(&field[..len])?;

    Ok(id.to_string())
}
