//! File metadata catalog: sanitized filename → chunk manifest.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use krill_types::{ChunkPlacement, FileRecord};
use tracing::{debug, info};

use crate::error::MetaError;

/// Strip path separators and shell wildcards, then trim surrounding
/// whitespace. `"../etc/passwd"` becomes `"..etcpasswd"`.
pub fn sanitize_filename(raw: &str) -> String {
    const FORBIDDEN: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];
    raw.chars()
        .filter(|c| !FORBIDDEN.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// The coordinator's file table.
///
/// Writes to the same filename are serialized by the table mutex; the last
/// registration wins wholesale. Lookups bump `last_accessed`.
pub struct FileCatalog {
    files: Mutex<HashMap<String, FileRecord>>,
}

impl FileCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
        }
    }

    /// Register a file manifest, replacing any previous record under the
    /// same sanitized name. Returns the sanitized name.
    ///
    /// Validation: chunks sorted by index must form exactly `[0, N-1]`,
    /// every placement needs at least one node, every size is nonzero, and
    /// the sizes sum to `total_size`. An empty manifest is accepted only
    /// for a zero-byte file.
    pub fn register(
        &self,
        filename: &str,
        total_size: u64,
        mut chunks: Vec<ChunkPlacement>,
    ) -> Result<String, MetaError> {
        let sanitized = sanitize_filename(filename);
        if sanitized.is_empty() {
            return Err(MetaError::EmptyFilename);
        }

        chunks.sort_by_key(|c| c.index);
        validate_manifest(total_size, &chunks)?;

        let now = Instant::now();
        let record = FileRecord {
            filename: sanitized.clone(),
            total_size,
            chunks,
            upload_time: now,
            last_accessed: now,
        };

        let mut files = self.files.lock().expect("catalog lock poisoned");
        let replaced = files.insert(sanitized.clone(), record).is_some();
        info!(filename = %sanitized, total_size, replaced, "registered file");
        Ok(sanitized)
    }

    /// Look up a file by (unsanitized) name, bumping `last_accessed`.
    pub fn lookup(&self, filename: &str) -> Option<FileRecord> {
        let sanitized = sanitize_filename(filename);
        let mut files = self.files.lock().expect("catalog lock poisoned");
        let record = files.get_mut(&sanitized)?;
        record.last_accessed = Instant::now();
        Some(record.clone())
    }

    /// Whether a file is registered.
    pub fn contains(&self, filename: &str) -> bool {
        let sanitized = sanitize_filename(filename);
        let files = self.files.lock().expect("catalog lock poisoned");
        files.contains_key(&sanitized)
    }

    /// `(filename, total_size)` pairs, sorted by name for stable listings.
    pub fn list(&self) -> Vec<(String, u64)> {
        let files = self.files.lock().expect("catalog lock poisoned");
        let mut listing: Vec<(String, u64)> = files
            .values()
            .map(|r| (r.filename.clone(), r.total_size))
            .collect();
        listing.sort();
        listing
    }

    /// Remove a file record. Returns whether one existed.
    pub fn remove(&self, filename: &str) -> bool {
        let sanitized = sanitize_filename(filename);
        let mut files = self.files.lock().expect("catalog lock poisoned");
        let removed = files.remove(&sanitized).is_some();
        if removed {
            debug!(filename = %sanitized, "removed file record");
        }
        removed
    }

    /// Number of registered files.
    pub fn len(&self) -> usize {
        self.files.lock().expect("catalog lock poisoned").len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for FileCatalog {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_manifest(total_size: u64, sorted: &[ChunkPlacement]) -> Result<(), MetaError> {
    if sorted.is_empty() {
        if total_size != 0 {
            return Err(MetaError::InvalidManifest(format!(
                "no chunks for a {total_size}-byte file"
            )));
        }
        return Ok(());
    }

    let mut sum = 0u64;
    for (position, chunk) in sorted.iter().enumerate() {
        if chunk.index != position as u64 {
            return Err(MetaError::InvalidManifest(format!(
                "chunk indices are not contiguous: expected {position}, found {}",
                chunk.index
            )));
        }
        if chunk.node_ids.is_empty() {
            return Err(MetaError::InvalidManifest(format!(
                "chunk {} has no holding nodes",
                chunk.index
            )));
        }
        if chunk.size == 0 {
            return Err(MetaError::InvalidManifest(format!(
                "chunk {} has zero size",
                chunk.index
            )));
        }
        sum += chunk.size;
    }

    if sum != total_size {
        return Err(MetaError::InvalidManifest(format!(
            "chunk sizes sum to {sum}, expected {total_size}"
        )));
    }
    Ok(())
}
