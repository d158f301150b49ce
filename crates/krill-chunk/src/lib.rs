//! Chunk pipeline: splitting files into fixed-size content-addressed chunks
//! and reassembling a downloaded chunk sequence into a file.
//!
//! Splitting reads the input in [`CHUNK_SIZE`](krill_types::CHUNK_SIZE)
//! windows and derives each chunk's identity from the SHA-256 of its bytes.
//! Reassembly is the strict inverse: the sequence must form a gap-free
//! `[0, N-1]` index range and every payload must re-hash to its recorded id
//! before a single byte is written.

mod assemble;
mod error;
mod split;

pub use assemble::reassemble;
pub use error::ChunkError;
pub use split::{split_bytes, split_file, split_reader};
