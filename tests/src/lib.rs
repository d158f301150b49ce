//! In-process cluster harness for Krill integration tests.
//!
//! Spawns a real coordinator and real storage nodes inside one process,
//! each on an ephemeral localhost port, wired together over the actual
//! wire protocol. Tests drive the cluster through [`CoordinatorClient`],
//! [`Uploader`] and [`Downloader`] exactly as the CLI would.

use std::sync::Arc;
use std::time::Duration;

use krill_client::CoordinatorClient;
use krill_coordd::handler::Coordinator;
use krill_coordd::server;
use krill_meta::{FileCatalog, NodeRegistry};
use krill_store::{ChunkStore, MemoryStore};
use krill_stored::{heartbeat, service};
use krill_types::NodeId;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Tunables for a test cluster.
#[derive(Debug, Clone)]
pub struct ClusterOptions {
    /// Number of storage nodes to spawn.
    pub nodes: usize,
    /// Byte budget per storage node.
    pub node_capacity: u64,
    /// Registry node timeout.
    pub node_timeout: Duration,
    /// Registry sweep interval.
    pub sweep_interval: Duration,
    /// Coordinator connection cap.
    pub max_clients: usize,
    /// Heartbeat interval for spawned nodes; `None` disables the heartbeat
    /// loop entirely (the node only registers once).
    pub heartbeat: Option<Duration>,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            nodes: 3,
            node_capacity: 64 * 1024 * 1024,
            node_timeout: Duration::from_secs(10),
            sweep_interval: Duration::from_secs(1),
            max_clients: 100,
            heartbeat: None,
        }
    }
}

/// One spawned storage node.
pub struct TestNode {
    /// Coordinator-assigned id.
    pub node_id: NodeId,
    /// Chunk-transfer endpoint.
    pub addr: std::net::SocketAddr,
    /// The node's backing store, for direct inspection and corruption.
    pub store: Arc<MemoryStore>,
    shutdown: watch::Sender<bool>,
}

impl TestNode {
    /// Stop the node's listener and heartbeat.
    pub fn stop(&self) {
        self.shutdown.send(true).ok();
    }

    /// Replace a stored chunk's bytes with garbage of the same length.
    pub async fn corrupt_chunk(&self, id: &krill_types::ChunkId) {
        let original = self
            .store
            .get(id)
            .await
            .unwrap()
            .expect("chunk to corrupt is not stored here");
        let garbage = bytes::Bytes::from(vec![0xEEu8; original.len()]);
        self.store.delete(id).await.unwrap();
        self.store.put(*id, garbage).await.unwrap();
    }
}

/// A running in-process cluster.
pub struct TestCluster {
    /// Address of the coordinator's request loop.
    pub coordinator_addr: std::net::SocketAddr,
    /// The coordinator's registry, for direct assertions.
    pub registry: Arc<NodeRegistry>,
    /// The coordinator's file catalog, for direct assertions.
    pub catalog: Arc<FileCatalog>,
    /// Spawned storage nodes, in spawn order.
    pub nodes: Vec<TestNode>,
    options: ClusterOptions,
    shutdown: watch::Sender<bool>,
}

impl TestCluster {
    /// Spawn a cluster with default options and `nodes` storage nodes.
    pub async fn spawn(nodes: usize) -> Self {
        Self::spawn_with(ClusterOptions {
            nodes,
            ..ClusterOptions::default()
        })
        .await
    }

    /// Spawn a cluster with explicit options.
    pub async fn spawn_with(options: ClusterOptions) -> Self {
        let registry = Arc::new(NodeRegistry::with_timeouts(
            options.node_timeout,
            options.sweep_interval,
        ));
        let catalog = Arc::new(FileCatalog::new());
        let coordinator = Arc::new(Coordinator::new(registry.clone(), catalog.clone()));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let coordinator_addr = listener.local_addr().unwrap();
        let (shutdown, shutdown_rx) = watch::channel(false);

        tokio::spawn(server::serve(
            listener,
            coordinator,
            options.max_clients,
            shutdown_rx.clone(),
        ));
        {
            let registry = registry.clone();
            let shutdown_rx = shutdown_rx.clone();
            tokio::spawn(async move {
                registry.run_sweeper(shutdown_rx).await;
            });
        }

        let mut cluster = Self {
            coordinator_addr,
            registry,
            catalog,
            nodes: Vec::new(),
            options,
            shutdown,
        };
        for _ in 0..cluster.options.nodes {
            cluster.add_node().await;
        }
        cluster
    }

    /// Spawn one more storage node and register it.
    pub async fn add_node(&mut self) -> &TestNode {
        let store = Arc::new(MemoryStore::new(self.options.node_capacity));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = self.client();
        let node_id = client
            .register_node("127.0.0.1", addr.port(), self.options.node_capacity)
            .await
            .expect("node registration failed");

        let (shutdown, shutdown_rx) = watch::channel(false);
        tokio::spawn(service::serve_chunks(
            listener,
            store.clone() as Arc<dyn ChunkStore>,
            shutdown_rx.clone(),
        ));
        if let Some(interval) = self.options.heartbeat {
            tokio::spawn(heartbeat::run(
                client,
                node_id.clone(),
                store.clone() as Arc<dyn ChunkStore>,
                interval,
                shutdown_rx,
            ));
        }

        self.nodes.push(TestNode {
            node_id,
            addr,
            store,
            shutdown,
        });
        self.nodes.last().unwrap()
    }

    /// A wire client for the coordinator.
    pub fn client(&self) -> CoordinatorClient {
        CoordinatorClient::new(self.coordinator_addr)
    }

    /// An uploader against this cluster.
    pub fn uploader(&self) -> krill_client::Uploader {
        krill_client::Uploader::new(self.client())
    }

    /// A downloader against this cluster.
    pub fn downloader(&self) -> krill_client::Downloader {
        krill_client::Downloader::new(self.client())
    }

    /// Every node that currently stores the given chunk.
    pub async fn holders_of(&self, id: &krill_types::ChunkId) -> Vec<usize> {
        let mut holders = Vec::new();
        for (i, node) in self.nodes.iter().enumerate() {
            if node.store.contains(id).await.unwrap() {
                holders.push(i);
            }
        }
        holders
    }
}

impl Drop for TestCluster {
    fn drop(&mut self) {
        self.shutdown.send(true).ok();
        for node in &self.nodes {
            node.stop();
        }
    }
}

/// The byte pattern `0x00..0xFF` repeated to `len` bytes.
pub fn patterned_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 256) as u8).collect()
}
