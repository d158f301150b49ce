//! Shared types and identifiers for Krill.
//!
//! This crate defines the core vocabulary used across the Krill workspace:
//! identifiers ([`ChunkId`], [`NodeId`]), cluster records ([`Chunk`],
//! [`ChunkPlacement`], [`FileRecord`], [`StorageNode`], [`NodeEndpoint`]),
//! the cluster-wide constants, and the deterministic replica placement
//! formula shared by client and tests.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Cluster constants
// ---------------------------------------------------------------------------

/// Fixed chunk size: files are split into 1 MiB windows.
pub const CHUNK_SIZE: usize = 1_048_576;

/// Number of distinct storage nodes each chunk is written to.
pub const REPLICATION_FACTOR: usize = 2;

/// Interval between liveness sweeps on the coordinator, and between
/// keep-alive pushes from a storage node.
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// A node whose last keep-alive is older than this is considered inactive.
pub const NODE_TIMEOUT: Duration = Duration::from_secs(60);

/// Maximum number of registered storage nodes.
pub const MAX_NODES: usize = 1000;

/// Maximum number of concurrently serviced coordinator connections.
pub const MAX_CLIENTS: usize = 100;

/// Maximum simultaneous chunk transfers per file on the client.
pub const MAX_PARALLEL_TRANSFERS: usize = 4;

/// Read/write deadline for text exchanges.
pub const TEXT_TIMEOUT: Duration = Duration::from_secs(30);

/// Read/write deadline for binary chunk transfers.
pub const BINARY_TIMEOUT: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Error parsing an identifier from its wire representation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdParseError {
    /// A chunk id must be exactly 64 hex characters.
    #[error("chunk id must be 64 hex characters, got {0}")]
    BadLength(usize),

    /// A chunk id may only contain hex digits.
    #[error("chunk id contains a non-hex character")]
    NonHex,

    /// A node id must be a single non-empty token.
    #[error("node id must be a non-empty token without whitespace")]
    BadNodeToken,
}

/// Content-addressed identifier for a chunk: `sha256(chunk_data)`.
///
/// On the wire a chunk id is its 64-character lowercase hex rendering;
/// [`FromStr`] accepts either case and stores the canonical bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct ChunkId([u8; 32]);

impl ChunkId {
    /// Compute the id of a chunk payload.
    pub fn from_data(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Return the raw 32-byte digest.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for ChunkId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for ChunkId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkId({self})")
    }
}

impl FromStr for ChunkId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 64 {
            return Err(IdParseError::BadLength(s.len()));
        }
        let mut bytes = [0u8; 32];
        let raw = s.as_bytes();
        for (i, byte) in bytes.iter_mut().enumerate() {
            let hi = hex_nibble(raw[i * 2]).ok_or(IdParseError::NonHex)?;
            let lo = hex_nibble(raw[i * 2 + 1]).ok_or(IdParseError::NonHex)?;
            *byte = (hi << 4) | lo;
        }
        Ok(Self(bytes))
    }
}

fn hex_nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Coordinator-assigned opaque token identifying a registered storage node.
///
/// Tokens are unique per registration: the same endpoint registering twice
/// receives two distinct ids, and the older record ages out via the
/// liveness sweep.
#[derive(Clone, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct NodeId(String);

impl NodeId {
    /// Generate a fresh token: registration time in hex milliseconds plus
    /// eight random hex digits. Collisions are handled by the registry
    /// regenerating until unique.
    pub fn generate() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let suffix: u32 = rand::random();
        Self(format!("{millis:x}{suffix:08x}"))
    }

    /// Return the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl FromStr for NodeId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.chars().any(char::is_whitespace) {
            return Err(IdParseError::BadNodeToken);
        }
        Ok(Self(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Core records
// ---------------------------------------------------------------------------

/// A chunk in transit: payload plus its content-addressed identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Content-addressed identifier: `sha256(data)`.
    pub id: ChunkId,
    /// Zero-based ordinal within the file.
    pub index: u64,
    /// The raw payload, 1..=[`CHUNK_SIZE`] bytes.
    pub data: Bytes,
}

impl Chunk {
    /// Build a chunk from its payload, computing the id.
    pub fn from_data(index: u64, data: Bytes) -> Self {
        let id = ChunkId::from_data(&data);
        Self { id, index, data }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty. Valid chunks never are.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Re-hash the payload and compare against the recorded id.
    pub fn verify(&self) -> bool {
        ChunkId::from_data(&self.data) == self.id
    }
}

/// A chunk's presence record in the coordinator's file table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlacement {
    /// Content-addressed identifier of the chunk.
    pub chunk_id: ChunkId,
    /// Zero-based ordinal within the file.
    pub index: u64,
    /// Payload length in bytes.
    pub size: u64,
    /// Storage nodes that acknowledged holding this chunk. Never empty in a
    /// registered manifest.
    pub node_ids: Vec<NodeId>,
}

/// A registered file's manifest.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Sanitized filename (no path separators, no shell wildcards).
    pub filename: String,
    /// Sum of all chunk sizes.
    pub total_size: u64,
    /// Chunk placements sorted by index, forming exactly `[0, N-1]`.
    pub chunks: Vec<ChunkPlacement>,
    /// When the manifest was registered.
    pub upload_time: Instant,
    /// Last successful lookup.
    pub last_accessed: Instant,
}

/// A registered storage backend as tracked by the coordinator.
#[derive(Debug, Clone)]
pub struct StorageNode {
    /// Coordinator-assigned opaque token.
    pub node_id: NodeId,
    /// IPv4 address for chunk transfers.
    pub ip: String,
    /// TCP port for chunk transfers.
    pub port: u16,
    /// Last reported free space in bytes.
    pub free_space: u64,
    /// Capacity reported at registration.
    pub total_space: u64,
    /// Registration time.
    pub registered_at: Instant,
    /// Last keep-alive (or registration).
    pub last_seen: Instant,
    /// Cleared by the liveness sweep once `last_seen` ages past the node
    /// timeout; restored by the next keep-alive.
    pub is_active: bool,
}

impl StorageNode {
    /// The endpoint tuple handed out to clients.
    pub fn endpoint(&self) -> NodeEndpoint {
        NodeEndpoint {
            node_id: self.node_id.clone(),
            ip: self.ip.clone(),
            port: self.port,
            free_space: self.free_space,
        }
    }
}

/// The wire form of a storage node as seen by clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEndpoint {
    /// Opaque node token.
    pub node_id: NodeId,
    /// IPv4 address.
    pub ip: String,
    /// TCP port.
    pub port: u16,
    /// Free space as of the coordinator's last report.
    pub free_space: u64,
}

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

/// Deterministic round-robin placement: replica `r` of chunk `i` goes to
/// `nodes[(i * R + r) % len]` over the coordinator-supplied candidate list.
///
/// The coordinator only supplies candidates; replica selection is entirely
/// client-side, which keeps placement reproducible in tests.
pub fn replica_node_index(chunk_index: u64, replica: usize, pool_len: usize) -> usize {
    debug_assert!(pool_len > 0);
    (chunk_index as usize * REPLICATION_FACTOR + replica) % pool_len
}

/// Number of chunks a file of `total_size` bytes splits into.
pub fn chunk_count(total_size: u64) -> u64 {
    total_size.div_ceil(CHUNK_SIZE as u64)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
