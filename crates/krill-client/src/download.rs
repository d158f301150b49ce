//! Download orchestrator: fetch the chunk table, pull replicas, reassemble.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use krill_proto::ChunkLocations;
use krill_types::{Chunk, ChunkId, MAX_PARALLEL_TRANSFERS, NodeEndpoint, NodeId};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::coordinator::CoordinatorClient;
use crate::error::ClientError;
use crate::node;
use crate::progress::{Progress, ProgressFn};

/// Outcome of a successful download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadSummary {
    /// Number of chunks fetched.
    pub chunks: usize,
    /// Bytes written to the output file.
    pub total_size: u64,
}

/// Downloads a file from the cluster.
///
/// For each chunk the replicas are tried in coordinator order; the first
/// one whose bytes re-hash to the expected id wins. A replica that fails
/// or serves corrupt bytes is skipped silently at the byte level; only
/// when every replica fails does the download abort.
pub struct Downloader {
    coordinator: CoordinatorClient,
    progress: Option<ProgressFn>,
}

impl Downloader {
    /// Create a downloader talking to the given coordinator.
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

    /// Download `remote_filename` to `local_path`.
    pub async fn download(
        &self,
        remote_filename: &str,
        local_path: &Path,
    ) -> Result<DownloadSummary, ClientError> {
        let plan = self.coordinator.request_download(remote_filename).await?;
        info!(
            file = remote_filename,
            chunks = plan.chunks.len(),
            total_size = plan.total_size,
            "starting download"
        );

        let endpoints = Arc::new(plan.endpoints);
        let semaphore = Arc::new(Semaphore::new(MAX_PARALLEL_TRANSFERS));
        let progress = Arc::new(Progress::new(plan.chunks.len(), self.progress.clone()));

        let mut tasks = JoinSet::new();
        for locations in plan.chunks {
            let endpoints = endpoints.clone();
            let semaphore = semaphore.clone();
            let progress = progress.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                let chunk = fetch_chunk(locations, &endpoints).await?;
                progress.tick();
                Ok::<_, ClientError>(chunk)
            });
        }

        let mut chunks = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let chunk = joined.map_err(|e| ClientError::TaskFailed(e.to_string()))??;
            chunks.push(chunk);
        }

        krill_chunk::reassemble(&chunks, local_path).await?;
        info!(file = remote_filename, path = %local_path.display(), "download complete");

        Ok(DownloadSummary {
            chunks: chunks.len(),
            total_size: plan.total_size,
        })
    }
}

/// Pull one chunk from the first replica that serves verifiable bytes.
pub(crate) async fn fetch_chunk(
    locations: ChunkLocations,
    endpoints: &HashMap<NodeId, NodeEndpoint>,
) -> Result<Chunk, ClientError> {
    for replica in &locations.replicas {
        let endpoint = match &replica.endpoint {
            Some((ip, port)) => NodeEndpoint {
                node_id: replica.node_id.clone(),
                ip: ip.clone(),
                port: *port,
                free_space: 0,
            },
            None => match endpoints.get(&replica.node_id) {
                Some(cached) => cached.clone(),
                None => {
                    debug!(node = %replica.node_id, "replica has no known endpoint, skipping");
                    continue;
                }
            },
        };

        match node::get_chunk(&endpoint, &locations.chunk_id).await {
            Ok(data) => {
                if data.len() as u64 == locations.size
                    && ChunkId::from_data(&data) == locations.chunk_id
                {
                    return Ok(Chunk {
                        id: locations.chunk_id,
                        index: locations.index,
                        data,
                    });
                }
                warn!(
                    chunk = locations.index,
                    node = %replica.node_id,
                    "replica served bytes that do not match the chunk id, trying next"
                );
            }
            Err(e) => {
                warn!(
                    chunk = locations.index,
                    node = %replica.node_id,
                    %e,
                    "replica fetch failed, trying next"
                );
            }
        }
    }

    Err(ClientError::ChunkUnavailable {
        index: locations.index,
    })
}
