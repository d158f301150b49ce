//! Chunk storage backends for Krill storage nodes.
//!
//! A [`ChunkStore`] holds chunk payloads keyed by their content-addressed
//! id. Because the key is the SHA-256 of the value, `put` is idempotent:
//! storing the same chunk twice leaves the bytes identical. Two backends
//! are provided: [`FileStore`] (one file per chunk under a root directory)
//! and [`MemoryStore`] (budgeted map, for tests and ephemeral nodes).

mod error;
mod file_store;
mod memory_store;
mod traits;

pub use error::StoreError;
pub use file_store::FileStore;
pub use memory_store::MemoryStore;
pub use traits::{ChunkStore, StorageCapacity};
