//! Error types for chunk storage.

use krill_types::ChunkId;

/// Errors returned by [`ChunkStore`](crate::ChunkStore) operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The store's byte budget cannot fit the chunk.
    #[error("capacity exceeded: need {needed} bytes, {available} available")]
    CapacityExceeded {
        /// Bytes the write would add.
        needed: u64,
        /// Bytes still available.
        available: u64,
    },

    /// Stored bytes no longer hash to their id.
    #[error("chunk corruption detected: expected {expected}, actual {actual}")]
    Corrupt {
        /// The id the chunk was stored under.
        expected: ChunkId,
        /// What the bytes actually hash to.
        actual: ChunkId,
    },

    /// The chunk is not present.
    #[error("chunk not found: {0}")]
    NotFound(ChunkId),
}
