//! Keep-alive expiry and revival over the wire.

use std::time::Duration;

use krill_integration_tests::{ClusterOptions, TestCluster};
use krill_proto::ErrorCode;
use krill_store::ChunkStore;

fn short_lived() -> ClusterOptions {
    ClusterOptions {
        nodes: 0,
        node_timeout: Duration::from_millis(300),
        sweep_interval: Duration::from_millis(100),
        ..ClusterOptions::default()
    }
}

#[tokio::test]
async fn silent_node_expires_and_is_excluded_from_placement() {
    let mut cluster = TestCluster::spawn_with(ClusterOptions {
        heartbeat: None,
        ..short_lived()
    })
    .await;
    cluster.add_node().await;
    cluster.add_node().await;

    // Fresh after registration: both nodes are placement candidates.
    let nodes = cluster.client().request_upload("f.bin", 100).await.unwrap();
    assert_eq!(nodes.len(), 2);

    // Outlive the node timeout without any keep-alives.
    tokio::time::sleep(Duration::from_millis(600)).await;

    // LIST_NODES still shows both entries, now inactive.
    let listing = cluster.client().list_nodes().await.unwrap();
    assert_eq!(listing.len(), 2, "expiry must not evict registry entries");
    assert!(listing.iter().all(|(_, active)| !active));

    // Placement excludes them entirely.
    let err = cluster
        .client()
        .request_upload("f.bin", 100)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        krill_client::ClientError::Remote(ErrorCode::InsufficientNodes)
    ));
}

#[tokio::test]
async fn heartbeating_node_stays_active() {
    let mut cluster = TestCluster::spawn_with(ClusterOptions {
        heartbeat: Some(Duration::from_millis(100)),
        ..short_lived()
    })
    .await;
    cluster.add_node().await;

    tokio::time::sleep(Duration::from_millis(700)).await;

    let listing = cluster.client().list_nodes().await.unwrap();
    assert_eq!(listing.len(), 1);
    assert!(listing[0].1, "a heartbeating node must stay active");
}

#[tokio::test]
async fn keep_alive_revives_an_expired_node() {
    let mut cluster = TestCluster::spawn_with(ClusterOptions {
        heartbeat: None,
        ..short_lived()
    })
    .await;
    cluster.add_node().await;
    let node_id = cluster.nodes[0].node_id.clone();

    tokio::time::sleep(Duration::from_millis(600)).await;
    let listing = cluster.client().list_nodes().await.unwrap();
    assert!(!listing[0].1);

    cluster.client().keep_alive(&node_id).await.unwrap();
    let listing = cluster.client().list_nodes().await.unwrap();
    assert!(listing[0].1, "keep-alive must restore the active flag");
}

#[tokio::test]
async fn heartbeat_refreshes_reported_free_space() {
    let mut cluster = TestCluster::spawn_with(ClusterOptions {
        heartbeat: Some(Duration::from_millis(100)),
        node_capacity: 1_000_000,
        ..ClusterOptions::default()
    })
    .await;
    cluster.add_node().await;
    let node_id = cluster.nodes[0].node_id.clone();

    // Occupy some space directly in the node's store; the next heartbeat
    // pushes the reduced free space to the coordinator.
    let data = bytes::Bytes::from(vec![7u8; 400_000]);
    let id = krill_types::ChunkId::from_data(&data);
    cluster.nodes[0].store.put(id, data).await.unwrap();

    tokio::time::sleep(Duration::from_millis(400)).await;
    let node = cluster.registry.get(&node_id).unwrap();
    assert_eq!(node.free_space, 600_000);
}

#[tokio::test]
async fn reregistration_gets_a_fresh_identity() {
    let cluster = TestCluster::spawn(0).await;
    let client = cluster.client();

    let first = client.register_node("127.0.0.1", 9321, 1000).await.unwrap();
    let second = client.register_node("127.0.0.1", 9321, 1000).await.unwrap();

    assert_ne!(first, second, "same endpoint must get distinct node ids");
    assert_eq!(cluster.registry.len(), 2);
}
