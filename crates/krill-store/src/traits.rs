//! Core trait and types for chunk storage.

use bytes::Bytes;
use krill_types::ChunkId;

use crate::error::StoreError;

/// Capacity information for a storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageCapacity {
    /// Total byte budget.
    pub total_bytes: u64,
    /// Bytes currently used.
    pub used_bytes: u64,
    /// Bytes available for new chunks.
    pub available_bytes: u64,
}

/// Trait for storing and retrieving content-addressed chunks.
///
/// Implementations must be `Send + Sync`; payloads travel as [`Bytes`] so
/// replication fan-out can clone them cheaply.
#[async_trait::async_trait]
pub trait ChunkStore: Send + Sync {
    /// Store a chunk under its id. Idempotent: a chunk that already exists
    /// is left untouched.
    async fn put(&self, id: ChunkId, data: Bytes) -> Result<(), StoreError>;

    /// Retrieve a chunk. Returns `None` if not present.
    async fn get(&self, id: &ChunkId) -> Result<Option<Bytes>, StoreError>;

    /// Whether a chunk is present.
    async fn contains(&self, id: &ChunkId) -> Result<bool, StoreError>;

    /// Delete a chunk. Deleting an absent chunk is not an error.
    async fn delete(&self, id: &ChunkId) -> Result<(), StoreError>;

    /// List all stored chunk ids.
    async fn list(&self) -> Result<Vec<ChunkId>, StoreError>;

    /// Report the store's byte budget and usage.
    async fn capacity(&self) -> Result<StorageCapacity, StoreError>;

    /// Re-hash a stored chunk and compare against its id.
    async fn verify(&self, id: &ChunkId) -> Result<bool, StoreError>;
}
