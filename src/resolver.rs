//! Operator resolution.
//!
//! Maps an operator identifier to the backend address that operator's
//! traffic is tunneled to. The supervisor depends only on the [`Resolve`]
//! capability; [`FileResolver`] is the file-backed implementation over the
//! `operators.conf` table, and [`StaticResolver`] holds an in-memory table
//! for embedding and tests.
//!
//! Lookup policy:
//! - The table is scanned in order and the first matching entry wins.
//! - Matching is exact string equality; no normalization is applied.
//! - A malformed entry fails the whole lookup, even if a later well-formed
//!   entry would have matched.
//! - The file is opened and scanned fresh on every lookup; nothing is cached.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddrV4;
use std::path::PathBuf;

use thiserror::Error;
use tracing::warn;

/// Failure to resolve an identifier to a backend address.
///
/// Every variant is terminal for the connection being handled: no retry, no
/// fallback address, no default route.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The identifier is not present in the table.
    #[error("identifier {0:?} not found in operator table")]
    NotFound(String),

    /// The table could not be read at all.
    #[error("operator table unavailable: {0}")]
    TableUnavailable(#[source] io::Error),

    /// The table contains an entry that cannot be interpreted.
    #[error("malformed operator table: line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

/// Capability to resolve an operator identifier to a backend address.
///
/// Lookups are synchronous, read-only, and side-effect-free from the
/// caller's perspective.
pub trait Resolve: Send + Sync {
    fn resolve(&self, id: &str) -> Result<SocketAddrV4, ResolveError>;
}

/// Resolver backed by an `operators.conf`-style table file.
///
/// One entry per line, whitespace-separated: `identifier ipv4-address port`.
/// Tokens beyond the third are ignored; blank lines are skipped.
#[derive(Debug, Clone)]
pub struct FileResolver {
    path: PathBuf,
}

impl FileResolver {
    /// Create a resolver reading the table at `path` on every lookup.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Resolve for FileResolver {
    fn resolve(&self, id: &str) -> Result<SocketAddrV4, ResolveError> {
        let table = std::fs::read_to_string(&self.path).map_err(ResolveError::TableUnavailable)?;

        for (index, line) in table.lines().enumerate() {
            let line_no = index + 1;
            if line.trim().is_empty() {
                continue;
            }

            let mut fields = line.split_whitespace();
            let (entry_id, entry_ip, entry_port) =
                match (fields.next(), fields.next(), fields.next()) {
                    (Some(id), Some(ip), Some(port)) => (id, ip, port),
                    _ => {
                        warn!(path = %self.path.display(), line = line_no, "Bad line in operator table");
                        return Err(ResolveError::Malformed {
                            line: line_no,
                            reason: "expected identifier, address and port".to_string(),
                        });
                    }
                };

            if entry_id != id {
                continue;
            }

            let ip = entry_ip.parse().map_err(|_| ResolveError::Malformed {
                line: line_no,
                reason: format!("bad IPv4 address {:?}", entry_ip),
            })?;
            let port = entry_port.parse().map_err(|_| ResolveError::Malformed {
                line: line_no,
                reason: format!("bad port {:?}", entry_port),
            })?;

            return Ok(SocketAddrV4::new(ip, port));
        }

        Err(ResolveError::NotFound(id.to_string()))
    }
}

/// Resolver over a fixed in-memory table.
#[derive(Debug, Default)]
pub struct StaticResolver {
    entries: HashMap<String, SocketAddrV4>,
}

impl StaticResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entry.
    pub fn insert(&mut self, id: impl Into<String>, addr: SocketAddrV4) {
        self.entries.insert(id.into(), addr);
    }
}

impl Resolve for StaticResolver {
    fn resolve(&self, id: &str) -> Result<SocketAddrV4, ResolveError> {
        self.entries
            .get(id)
            .copied()
            .ok_or_else(|| ResolveError::NotFound(id.to_string()))
    }
}
