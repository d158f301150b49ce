//! Error type for client operations.

use krill_proto::{ErrorCode, ProtoError};

/// Errors surfaced by the wire clients and orchestrators.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Wire-level failure (framing, timeout, parse).
    #[error("protocol error: {0}")]
    Proto(#[from] ProtoError),

    /// Socket-level failure (connect, read, write).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Chunk pipeline failure (split or reassemble).
    #[error("chunk error: {0}")]
    Chunk(#[from] krill_chunk::ChunkError),

    /// The peer replied with a wire error code.
    #[error("server error: {0}")]
    Remote(ErrorCode),

    /// The peer replied with something outside the protocol.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    /// The coordinator returned fewer placement candidates than the
    /// replication factor.
    #[error("insufficient storage nodes: need {needed}, got {got}")]
    InsufficientNodes {
        /// The replication factor.
        needed: usize,
        /// Candidates actually returned.
        got: usize,
    },

    /// A chunk could not be stored on all of its selected replicas.
    #[error("failed to replicate chunk {index} to {needed} nodes")]
    ReplicationFailed {
        /// Index of the chunk.
        index: u64,
        /// Replicas required.
        needed: usize,
    },

    /// Every replica of a chunk failed or served corrupt bytes.
    #[error("chunk {index} unavailable on all replicas")]
    ChunkUnavailable {
        /// Index of the chunk.
        index: u64,
    },

    /// A storage node advertised an endpoint that is not a socket address.
    #[error("invalid node endpoint: {0}")]
    BadEndpoint(String),

    /// A parallel transfer task was cancelled or panicked.
    #[error("transfer task failed: {0}")]
    TaskFailed(String),
}
