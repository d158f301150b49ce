//! In-memory chunk storage backend.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use krill_types::ChunkId;
use tracing::debug;

use crate::error::StoreError;
use crate::traits::{ChunkStore, StorageCapacity};

/// In-memory chunk store backed by a `RwLock<HashMap>`.
///
/// Used by tests and by storage nodes running with `--memory`. Tracks used
/// bytes against a configurable budget with an atomic counter.
pub struct MemoryStore {
    chunks: RwLock<HashMap<ChunkId, Bytes>>,
    max_bytes: u64,
    used_bytes: AtomicU64,
}

impl MemoryStore {
    /// Create a store with the given byte budget.
    pub fn new(max_bytes: u64) -> Self {
        Self {
            chunks: RwLock::new(HashMap::new()),
            max_bytes,
            used_bytes: AtomicU64::new(0),
        }
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> &RwLock<HashMap<ChunkId, Bytes>> {
        &self.chunks
    }
}

#[async_trait::async_trait]
impl ChunkStore for MemoryStore {
    async fn put(&self, id: ChunkId, data: Bytes) -> Result<(), StoreError> {
        let mut map = self.chunks.write().expect("store lock poisoned");
        if map.contains_key(&id) {
            // Content-addressed: same id means same bytes.
            return Ok(());
        }

        let used = self.used_bytes.load(Ordering::Relaxed);
        let needed = data.len() as u64;
        if used + needed > self.max_bytes {
            return Err(StoreError::CapacityExceeded {
                needed,
                available: self.max_bytes.saturating_sub(used),
            });
        }

        debug!(%id, size = data.len(), "storing chunk in memory");
        map.insert(id, data);
        self.used_bytes.store(used + needed, Ordering::Relaxed);
        Ok(())
    }

    async fn get(&self, id: &ChunkId) -> Result<Option<Bytes>, StoreError> {
        let map = self.chunks.read().expect("store lock poisoned");
        Ok(map.get(id).cloned())
    }

    async fn contains(&self, id: &ChunkId) -> Result<bool, StoreError> {
        let map = self.chunks.read().expect("store lock poisoned");
        Ok(map.contains_key(id))
    }

    async fn delete(&self, id: &ChunkId) -> Result<(), StoreError> {
        let mut map = self.chunks.write().expect("store lock poisoned");
        if let Some(removed) = map.remove(id) {
            self.used_bytes
                .fetch_sub(removed.len() as u64, Ordering::Relaxed);
            debug!(%id, "deleted chunk from memory");
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ChunkId>, StoreError> {
        let map = self.chunks.read().expect("store lock poisoned");
        Ok(map.keys().copied().collect())
    }

    async fn capacity(&self) -> Result<StorageCapacity, StoreError> {
        let used = self.used_bytes.load(Ordering::Relaxed);
        Ok(StorageCapacity {
            total_bytes: self.max_bytes,
            used_bytes: used,
            available_bytes: self.max_bytes.saturating_sub(used),
        })
    }

    async fn verify(&self, id: &ChunkId) -> Result<bool, StoreError> {
        let map = self.chunks.read().expect("store lock poisoned");
        match map.get(id) {
            Some(data) => Ok(ChunkId::from_data(data) == *id),
            None => Err(StoreError::NotFound(*id)),
        }
    }
}
