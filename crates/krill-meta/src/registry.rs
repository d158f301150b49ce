//! Storage node registry with keep-alive liveness tracking.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use krill_types::{KEEP_ALIVE_INTERVAL, MAX_NODES, NODE_TIMEOUT, NodeId, StorageNode};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::MetaError;

/// Registry of storage nodes known to the coordinator.
///
/// One coarse mutex guards the whole table; every operation copies out
/// under it. The periodic sweep only marks stale nodes inactive; eviction
/// is an explicit manual operation ([`evict_inactive`](Self::evict_inactive)).
pub struct NodeRegistry {
    nodes: Mutex<HashMap<NodeId, StorageNode>>,
    max_nodes: usize,
    node_timeout: Duration,
    sweep_interval: Duration,
}

impl NodeRegistry {
    /// Create a registry with the cluster default timeouts.
    pub fn new() -> Self {
        Self::with_timeouts(NODE_TIMEOUT, KEEP_ALIVE_INTERVAL)
    }

    /// Create a registry with explicit liveness timeouts.
    pub fn with_timeouts(node_timeout: Duration, sweep_interval: Duration) -> Self {
        Self {
            nodes: Mutex::new(HashMap::new()),
            max_nodes: MAX_NODES,
            node_timeout,
            sweep_interval,
        }
    }

    /// Override the registration cap. Intended for tests.
    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }

    /// The timeout after which a silent node is considered inactive.
    pub fn node_timeout(&self) -> Duration {
        self.node_timeout
    }

    /// Register a node and return its freshly assigned id.
    ///
    /// Each registration gets a distinct id, including repeat registrations
    /// from the same endpoint; the older record simply ages out.
    pub fn register(&self, ip: &str, port: u16, free_space: u64) -> Result<NodeId, MetaError> {
        validate_endpoint(ip, port)?;

        let mut nodes = self.nodes.lock().expect("registry lock poisoned");
        if nodes.len() >= self.max_nodes {
            return Err(MetaError::RegistryFull {
                max: self.max_nodes,
            });
        }

        let mut node_id = NodeId::generate();
        while nodes.contains_key(&node_id) {
            node_id = NodeId::generate();
        }

        let now = Instant::now();
        nodes.insert(
            node_id.clone(),
            StorageNode {
                node_id: node_id.clone(),
                ip: ip.to_string(),
                port,
                free_space,
                total_space: free_space,
                registered_at: now,
                last_seen: now,
                is_active: true,
            },
        );

        info!(%node_id, %ip, port, free_space, "registered storage node");
        Ok(node_id)
    }

    /// Refresh a node's liveness. Silent no-op for unknown ids.
    pub fn keep_alive(&self, node_id: &NodeId) {
        let mut nodes = self.nodes.lock().expect("registry lock poisoned");
        if let Some(node) = nodes.get_mut(node_id) {
            node.last_seen = Instant::now();
            node.is_active = true;
        }
    }

    /// Update a node's reported free space.
    pub fn update_space(&self, node_id: &NodeId, free_space: u64) -> Result<(), MetaError> {
        let mut nodes = self.nodes.lock().expect("registry lock poisoned");
        match nodes.get_mut(node_id) {
            Some(node) => {
                node.free_space = free_space;
                Ok(())
            }
            None => Err(MetaError::NodeNotFound(node_id.clone())),
        }
    }

    /// Copy out a node record.
    pub fn get(&self, node_id: &NodeId) -> Option<StorageNode> {
        let nodes = self.nodes.lock().expect("registry lock poisoned");
        nodes.get(node_id).cloned()
    }

    /// Select up to `count` placement candidates with at least
    /// `required_space` bytes free, best-provisioned first.
    ///
    /// A returned node is always active and within the node timeout.
    pub fn select_available(&self, count: usize, required_space: u64) -> Vec<StorageNode> {
        let mut available = self.filter_live(required_space);
        available.sort_by(|a, b| b.free_space.cmp(&a.free_space));
        available.truncate(count);
        available
    }

    /// All live nodes, unfiltered by space and unbounded.
    pub fn list_active(&self) -> Vec<StorageNode> {
        self.filter_live(0)
    }

    /// Every registered node, live or not, for `LIST_NODES`.
    pub fn list_all(&self) -> Vec<StorageNode> {
        let nodes = self.nodes.lock().expect("registry lock poisoned");
        nodes.values().cloned().collect()
    }

    fn filter_live(&self, required_space: u64) -> Vec<StorageNode> {
        let now = Instant::now();
        let nodes = self.nodes.lock().expect("registry lock poisoned");
        nodes
            .values()
            .filter(|n| {
                n.is_active
                    && now.duration_since(n.last_seen) <= self.node_timeout
                    && n.free_space >= required_space
            })
            .cloned()
            .collect()
    }

    /// Mark every node past the timeout inactive. Returns how many flipped.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut nodes = self.nodes.lock().expect("registry lock poisoned");
        let mut flipped = 0;
        for node in nodes.values_mut() {
            if node.is_active && now.duration_since(node.last_seen) > self.node_timeout {
                node.is_active = false;
                flipped += 1;
                debug!(node_id = %node.node_id, "node timed out, marked inactive");
            }
        }
        flipped
    }

    /// Remove every inactive entry. Manual operation; the sweep never calls
    /// this. Returns how many were removed.
    pub fn evict_inactive(&self) -> usize {
        let mut nodes = self.nodes.lock().expect("registry lock poisoned");
        let before = nodes.len();
        nodes.retain(|_, node| node.is_active);
        before - nodes.len()
    }

    /// Total registered nodes, active or not.
    pub fn len(&self) -> usize {
        self.nodes.lock().expect("registry lock poisoned").len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of live nodes.
    pub fn active_count(&self) -> usize {
        self.filter_live(0).len()
    }

    /// Sum of free space across live nodes.
    pub fn total_free_space(&self) -> u64 {
        self.filter_live(0).iter().map(|n| n.free_space).sum()
    }

    /// Run the liveness sweep until `shutdown` flips to `true`.
    pub async fn run_sweeper(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.sweep_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let flipped = self.sweep();
                    if flipped > 0 {
                        info!(flipped, "liveness sweep marked nodes inactive");
                    }
                }
                _ = shutdown.changed() => {
                    debug!("liveness sweeper stopping");
                    break;
                }
            }
        }
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_endpoint(ip: &str, port: u16) -> Result<(), MetaError> {
    if ip.parse::<Ipv4Addr>().is_err() || port == 0 {
        return Err(MetaError::InvalidEndpoint {
            ip: ip.to_string(),
            port,
        });
    }
    Ok(())
}
