//! Upload orchestrator: split, place, replicate, report.

use std::path::Path;
use std::sync::Arc;

use krill_types::{
    ChunkPlacement, MAX_PARALLEL_TRANSFERS, NodeEndpoint, REPLICATION_FACTOR, replica_node_index,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::coordinator::CoordinatorClient;
use crate::error::ClientError;
use crate::node;
use crate::progress::{Progress, ProgressFn};

/// Outcome of a successful upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadSummary {
    /// Number of chunks uploaded.
    pub chunks: usize,
    /// Total bytes uploaded (before replication).
    pub total_size: u64,
}

/// Uploads a local file into the cluster.
///
/// Replica `r` of chunk `i` goes to candidate `(i * R + r) % len` of the
/// coordinator-supplied node list. A chunk counts as uploaded only when all
/// of its selected replicas acknowledge; anything less aborts the upload.
/// Replicas already written stay where they are. There is no rollback, and
/// orphaned chunks are acceptable.
pub struct Uploader {
    coordinator: CoordinatorClient,
    progress: Option<ProgressFn>,
}

impl Uploader {
    /// Create an uploader talking to the given coordinator.
    pub fn new(coordinator: CoordinatorClient) -> Self {
        Self {
            coordinator,
            progress: None,
        }
    }

    /// Install a `(completed, total)` progress callback.
    pub fn with_progress(mut self, callback: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(callback));
        self
    }

    /// Upload `local_path` under the remote name `remote_filename`.
    pub async fn upload(
        &self,
        local_path: &Path,
        remote_filename: &str,
    ) -> Result<UploadSummary, ClientError> {
        let chunks = krill_chunk::split_file(local_path).await?;
        let total_size: u64 = chunks.iter().map(|c| c.len() as u64).sum();
        info!(
            file = %local_path.display(),
            chunks = chunks.len(),
            total_size,
            "starting upload"
        );

        if chunks.is_empty() {
            // An empty file has no chunks to place; register it directly.
            self.coordinator
                .upload_complete(remote_filename, &[])
                .await?;
            return Ok(UploadSummary {
                chunks: 0,
                total_size: 0,
            });
        }

        let nodes = self
            .coordinator
            .request_upload(remote_filename, total_size)
            .await?;
        if nodes.len() < REPLICATION_FACTOR {
            return Err(ClientError::InsufficientNodes {
                needed: REPLICATION_FACTOR,
                got: nodes.len(),
            });
        }

        let nodes = Arc::new(nodes);
        let semaphore = Arc::new(Semaphore::new(MAX_PARALLEL_TRANSFERS));
        let progress = Arc::new(Progress::new(chunks.len(), self.progress.clone()));

        let mut tasks = JoinSet::new();
        for chunk in chunks {
            let nodes = nodes.clone();
            let semaphore = semaphore.clone();
            let progress = progress.clone();
            tasks.spawn(async move {
                let placement = replicate_chunk(chunk, &nodes, semaphore).await?;
                progress.tick();
                Ok::<_, ClientError>(placement)
            });
        }

        let mut placements = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let placement = joined.map_err(|e| ClientError::TaskFailed(e.to_string()))??;
            placements.push(placement);
        }
        placements.sort_by_key(|p| p.index);

        self.coordinator
            .upload_complete(remote_filename, &placements)
            .await?;
        info!(file = remote_filename, chunks = placements.len(), "upload complete");

        Ok(UploadSummary {
            chunks: placements.len(),
            total_size,
        })
    }
}

/// Push one chunk to its replicas, in parallel, each push holding a
/// transfer permit. All selected replicas must acknowledge.
async fn replicate_chunk(
    chunk: krill_types::Chunk,
    nodes: &[NodeEndpoint],
    semaphore: Arc<Semaphore>,
) -> Result<ChunkPlacement, ClientError> {
    let index = chunk.index;
    let size = chunk.len() as u64;
    let chunk_id = chunk.id;

    let mut pushes = Vec::with_capacity(REPLICATION_FACTOR);
    for replica in 0..REPLICATION_FACTOR {
        let target = nodes[replica_node_index(index, replica, nodes.len())].clone();
        let chunk = chunk.clone();
        let semaphore = semaphore.clone();
        pushes.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
            match node::store_chunk(&target, &chunk).await {
                Ok(()) => Some(target.node_id.clone()),
                Err(e) => {
                    warn!(chunk = index, node = %target.node_id, %e, "replica store failed");
                    None
                }
            }
        }));
    }

    let mut acked = Vec::new();
    for push in pushes {
        if let Some(node_id) = push
            .await
            .map_err(|e| ClientError::TaskFailed(e.to_string()))?
        {
            acked.push(node_id);
        }
    }

    if acked.len() < REPLICATION_FACTOR {
        return Err(ClientError::ReplicationFailed {
            index,
            needed: REPLICATION_FACTOR,
        });
    }

    Ok(ChunkPlacement {
        chunk_id,
        index,
        size,
        node_ids: acked,
    })
}
