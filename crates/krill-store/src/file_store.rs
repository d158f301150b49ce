//! File-based chunk storage backend.
//!
//! One file per chunk, named by the chunk's 64-character hex id, directly
//! under the root directory. Writes go through a temp file and a rename so
//! a crashed node never leaves a half-written chunk under a valid name.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use krill_types::ChunkId;
use tracing::{debug, error};

use crate::error::StoreError;
use crate::traits::{ChunkStore, StorageCapacity};

/// File-per-chunk store with a configured byte budget.
///
/// Used bytes are recovered by scanning the root at open time and tracked
/// incrementally afterwards, so the reported free space stays correct
/// across restarts.
pub struct FileStore {
    root: PathBuf,
    max_bytes: u64,
    used_bytes: AtomicU64,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root` with the given
    /// byte budget.
    pub fn open(root: impl AsRef<Path>, max_bytes: u64) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;

        let mut used = 0u64;
        for entry in std::fs::read_dir(&root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() && is_chunk_name(&entry.file_name()) {
                used += entry.metadata()?.len();
            }
        }

        debug!(root = %root.display(), used, max_bytes, "opened file store");
        Ok(Self {
            root,
            max_bytes,
            used_bytes: AtomicU64::new(used),
        })
    }

    fn chunk_path(&self, id: &ChunkId) -> PathBuf {
        self.root.join(id.to_string())
    }
}

fn is_chunk_name(name: &std::ffi::OsStr) -> bool {
    name.to_str()
        .is_some_and(|s| s.len() == 64 && s.parse::<ChunkId>().is_ok())
}

#[async_trait::async_trait]
impl ChunkStore for FileStore {
    async fn put(&self, id: ChunkId, data: Bytes) -> Result<(), StoreError> {
        let path = self.chunk_path(&id);
        if tokio::fs::try_exists(&path).await? {
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

        let tmp_path = path.with_extension("tmp");
        tokio::fs::write(&tmp_path, &data).await?;
        tokio::fs::rename(&tmp_path, &path).await?;
        self.used_bytes.fetch_add(needed, Ordering::Relaxed);

        debug!(%id, size = data.len(), "stored chunk to file");
        Ok(())
    }

    async fn get(&self, id: &ChunkId) -> Result<Option<Bytes>, StoreError> {
        let path = self.chunk_path(id);
        match tokio::fs::read(&path).await {
            Ok(data) => {
                // Verify-on-read: a silently corrupted file must not be
                // served as a valid replica.
                let actual = ChunkId::from_data(&data);
                if actual != *id {
                    error!(expected = %id, %actual, "chunk corruption detected on read");
                    return Err(StoreError::Corrupt {
                        expected: *id,
                        actual,
                    });
                }
                Ok(Some(Bytes::from(data)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn contains(&self, id: &ChunkId) -> Result<bool, StoreError> {
        Ok(tokio::fs::try_exists(&self.chunk_path(id)).await?)
    }

    async fn delete(&self, id: &ChunkId) -> Result<(), StoreError> {
        let path = self.chunk_path(id);
        let size = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(StoreError::Io(e)),
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                self.used_bytes.fetch_sub(size, Ordering::Relaxed);
                debug!(%id, "deleted chunk file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn list(&self) -> Result<Vec<ChunkId>, StoreError> {
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && let Ok(id) = name.parse::<ChunkId>()
            {
                ids.push(id);
            }
        }
        Ok(ids)
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
        let path = self.chunk_path(id);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(ChunkId::from_data(&data) == *id),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(*id))
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}
