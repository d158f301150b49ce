//! Replica failover and integrity scenarios.

use krill_integration_tests::{TestCluster, patterned_bytes};
use krill_store::ChunkStore;
use krill_types::CHUNK_SIZE;

async fn upload_bytes(cluster: &TestCluster, name: &str, data: &[u8]) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("input.bin");
    tokio::fs::write(&path, data).await.unwrap();
    cluster.uploader().upload(&path, name).await.unwrap();
}

#[tokio::test]
async fn download_survives_one_dead_replica() {
    let cluster = TestCluster::spawn(2).await;
    let data = patterned_bytes(2 * CHUNK_SIZE);
    upload_bytes(&cluster, "resilient.bin", &data).await;

    // With two nodes and R=2 every chunk lives on both; killing one node
    // leaves a full copy on the survivor.
    cluster.nodes[0].stop();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.bin");
    cluster
        .downloader()
        .download("resilient.bin", &out)
        .await
        .unwrap();
    assert_eq!(tokio::fs::read(&out).await.unwrap(), data);
}

#[tokio::test]
async fn download_fails_when_all_replicas_dead() {
    let cluster = TestCluster::spawn(2).await;
    let data = patterned_bytes(CHUNK_SIZE / 2);
    upload_bytes(&cluster, "doomed.bin", &data).await;

    for node in &cluster.nodes {
        node.stop();
    }
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let dir = tempfile::tempdir().unwrap();
    let result = cluster
        .downloader()
        .download("doomed.bin", &dir.path().join("out.bin"))
        .await;
    assert!(matches!(
        result,
        Err(krill_client::ClientError::ChunkUnavailable { .. })
    ));
}

#[tokio::test]
async fn download_rejects_corrupt_replica_and_uses_survivor() {
    let cluster = TestCluster::spawn(2).await;
    let data = patterned_bytes(CHUNK_SIZE + 100);
    upload_bytes(&cluster, "attacked.bin", &data).await;

    // Poison every chunk on node 0; node 1 keeps honest copies.
    let poisoned = cluster.nodes[0].store.list().await.unwrap();
    assert!(!poisoned.is_empty());
    for id in &poisoned {
        cluster.nodes[0].corrupt_chunk(id).await;
    }

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.bin");
    cluster
        .downloader()
        .download("attacked.bin", &out)
        .await
        .unwrap();
    assert_eq!(tokio::fs::read(&out).await.unwrap(), data);
}

#[tokio::test]
async fn download_aborts_when_every_replica_is_corrupt() {
    let cluster = TestCluster::spawn(2).await;
    let data = patterned_bytes(1024);
    upload_bytes(&cluster, "hopeless.bin", &data).await;

    for node in &cluster.nodes {
        for id in node.store.list().await.unwrap() {
            node.corrupt_chunk(&id).await;
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let result = cluster
        .downloader()
        .download("hopeless.bin", &dir.path().join("out.bin"))
        .await;
    assert!(matches!(
        result,
        Err(krill_client::ClientError::ChunkUnavailable { .. })
    ));
}

#[tokio::test]
async fn upload_aborts_when_a_replica_target_is_dead() {
    let mut cluster = TestCluster::spawn(0).await;
    cluster.add_node().await;
    cluster.add_node().await;

    // Kill one node after registration: the coordinator still offers it as
    // a candidate, so some replica push must fail and the upload aborts.
    cluster.nodes[1].stop();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("input.bin");
    tokio::fs::write(&path, patterned_bytes(1024)).await.unwrap();

    let result = cluster.uploader().upload(&path, "unlucky.bin").await;
    assert!(matches!(
        result,
        Err(krill_client::ClientError::ReplicationFailed { .. })
    ));

    // No manifest was registered for the failed upload.
    assert!(cluster.catalog.lookup("unlucky.bin").is_none());
}
