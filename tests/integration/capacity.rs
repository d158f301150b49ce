//! Placement capacity filters and the coordinator connection cap.

use krill_integration_tests::{ClusterOptions, TestCluster, patterned_bytes};
use krill_proto::{ErrorCode, read_line};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

#[tokio::test]
async fn upload_rejected_when_nodes_lack_chunk_space() {
    // Two nodes, each with less free space than one chunk.
    let cluster = TestCluster::spawn_with(ClusterOptions {
        nodes: 2,
        node_capacity: 500_000,
        ..ClusterOptions::default()
    })
    .await;

    let err = cluster
        .client()
        .request_upload("foo", 2_000_000)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        krill_client::ClientError::Remote(ErrorCode::InsufficientNodes)
    ));
}

#[tokio::test]
async fn upload_rejected_below_replication_factor() {
    let cluster = TestCluster::spawn(1).await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("input.bin");
    tokio::fs::write(&path, patterned_bytes(1024)).await.unwrap();

    let err = cluster
        .uploader()
        .upload(&path, "needs-two.bin")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        krill_client::ClientError::Remote(ErrorCode::InsufficientNodes)
    ));
}

#[tokio::test]
async fn candidate_pool_scales_with_file_size() {
    // Four nodes; a one-chunk file asks for R candidates but every
    // qualifying node may be returned, capped by the request.
    let cluster = TestCluster::spawn(4).await;
    let nodes = cluster.client().request_upload("f.bin", 100).await.unwrap();
    // ceil(100 / 1 MiB) = 1 chunk → 2 candidates requested.
    assert_eq!(nodes.len(), 2);

    let nodes = cluster
        .client()
        .request_upload("g.bin", 3 * krill_types::CHUNK_SIZE as u64)
        .await
        .unwrap();
    // 3 chunks → 6 requested, only 4 exist.
    assert_eq!(nodes.len(), 4);
}

#[tokio::test]
async fn excess_connection_is_closed_without_reply() {
    let cluster = TestCluster::spawn_with(ClusterOptions {
        nodes: 0,
        max_clients: 2,
        ..ClusterOptions::default()
    })
    .await;

    // Park two workers mid-request by connecting without sending a line.
    let held1 = TcpStream::connect(cluster.coordinator_addr).await.unwrap();
    let held2 = TcpStream::connect(cluster.coordinator_addr).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let mut rejected = TcpStream::connect(cluster.coordinator_addr).await.unwrap();
    rejected.write_all(b"LIST_FILES\r\n").await.unwrap();
    assert!(
        read_line(&mut rejected).await.is_err(),
        "the over-cap connection must be closed without a reply"
    );

    // Releasing a slot restores service.
    drop(held1);
    drop(held2);
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    let files = cluster.client().list_files().await.unwrap();
    assert!(files.is_empty());
}

#[tokio::test]
async fn free_space_updates_feed_placement() {
    let cluster = TestCluster::spawn(2).await;

    // Shrink one node's reported space below a chunk; it no longer
    // qualifies, leaving fewer candidates than the replication factor.
    let starved = &cluster.nodes[0].node_id;
    cluster
        .client()
        .update_space(starved, 1000)
        .await
        .unwrap();

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
