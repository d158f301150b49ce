//! Error type for the chunk pipeline.

/// Errors produced while splitting or reassembling chunks.
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    /// I/O failure reading the input or writing the output file.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The chunk sequence does not form `[0, N-1]` after sorting.
    #[error("broken chunk sequence: expected index {expected}, found {found}")]
    BrokenSequence {
        /// The index the sorted position called for.
        expected: u64,
        /// The index actually present at that position.
        found: u64,
    },

    /// A chunk's payload does not re-hash to its recorded id.
    #[error("digest mismatch on chunk {index}")]
    DigestMismatch {
        /// Index of the offending chunk.
        index: u64,
    },
}
