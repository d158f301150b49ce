//! End-to-end upload/download round trips.

use krill_integration_tests::{TestCluster, patterned_bytes};
use krill_store::ChunkStore;
use krill_types::{CHUNK_SIZE, ChunkId};

/// Upload `data` under `name` from a temp file, returning the temp dir for
/// further writes.
async fn upload_bytes(cluster: &TestCluster, name: &str, data: &[u8]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("input.bin");
    tokio::fs::write(&path, data).await.unwrap();
    cluster.uploader().upload(&path, name).await.unwrap();
    dir
}

async fn download_bytes(cluster: &TestCluster, name: &str) -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("output.bin");
    cluster.downloader().download(name, &path).await.unwrap();
    tokio::fs::read(&path).await.unwrap()
}

#[tokio::test]
async fn two_chunk_patterned_file_roundtrip() {
    let cluster = TestCluster::spawn(3).await;
    let data = patterned_bytes(2 * CHUNK_SIZE);
    upload_bytes(&cluster, "pattern.bin", &data).await;

    // The manifest records exactly two chunks whose ids are the SHA-256 of
    // each 1 MiB half, each on two replicas.
    let record = cluster.catalog.lookup("pattern.bin").unwrap();
    assert_eq!(record.total_size, 2 * CHUNK_SIZE as u64);
    assert_eq!(record.chunks.len(), 2);
    assert_eq!(record.chunks[0].chunk_id, ChunkId::from_data(&data[..CHUNK_SIZE]));
    assert_eq!(record.chunks[1].chunk_id, ChunkId::from_data(&data[CHUNK_SIZE..]));
    // Both halves are the same repeating pattern, so they share one chunk
    // id; every chunk still has two acknowledged replicas, and the shared
    // id is held by at least two nodes.
    assert_eq!(record.chunks[0].chunk_id, record.chunks[1].chunk_id);
    for chunk in &record.chunks {
        assert_eq!(chunk.node_ids.len(), 2);
        assert!(cluster.holders_of(&chunk.chunk_id).await.len() >= 2);
    }

    // LIST_FILES shows one entry with the full size.
    let files = cluster.client().list_files().await.unwrap();
    assert_eq!(files, vec![("pattern.bin".to_string(), 2 * CHUNK_SIZE as u64)]);

    // Download yields an identical file.
    assert_eq!(download_bytes(&cluster, "pattern.bin").await, data);
}

#[tokio::test]
async fn empty_file_roundtrip() {
    let cluster = TestCluster::spawn(3).await;
    upload_bytes(&cluster, "empty.bin", b"").await;

    let record = cluster.catalog.lookup("empty.bin").unwrap();
    assert_eq!(record.total_size, 0);
    assert!(record.chunks.is_empty());

    let downloaded = download_bytes(&cluster, "empty.bin").await;
    assert!(downloaded.is_empty());
}

#[tokio::test]
async fn exact_multiple_has_no_tail_chunk() {
    let cluster = TestCluster::spawn(3).await;
    let data = patterned_bytes(3 * CHUNK_SIZE);
    upload_bytes(&cluster, "exact.bin", &data).await;

    let record = cluster.catalog.lookup("exact.bin").unwrap();
    assert_eq!(record.chunks.len(), 3);
    assert!(record.chunks.iter().all(|c| c.size == CHUNK_SIZE as u64));

    assert_eq!(download_bytes(&cluster, "exact.bin").await, data);
}

#[tokio::test]
async fn one_byte_over_gets_a_one_byte_tail() {
    let cluster = TestCluster::spawn(3).await;
    let data = patterned_bytes(CHUNK_SIZE + 1);
    upload_bytes(&cluster, "tail.bin", &data).await;

    let record = cluster.catalog.lookup("tail.bin").unwrap();
    assert_eq!(record.chunks.len(), 2);
    assert_eq!(record.chunks[0].size, CHUNK_SIZE as u64);
    assert_eq!(record.chunks[1].size, 1);

    assert_eq!(download_bytes(&cluster, "tail.bin").await, data);
}

#[tokio::test]
async fn small_file_roundtrip() {
    let cluster = TestCluster::spawn(2).await;
    let data = b"just a few bytes".to_vec();
    upload_bytes(&cluster, "small.bin", &data).await;
    assert_eq!(download_bytes(&cluster, "small.bin").await, data);
}

#[tokio::test]
async fn filename_with_spaces_survives_list_and_download() {
    let cluster = TestCluster::spawn(2).await;
    let data = patterned_bytes(1000);
    upload_bytes(&cluster, "my summer photos.zip", &data).await;

    let files = cluster.client().list_files().await.unwrap();
    assert_eq!(files[0].0, "my summer photos.zip");

    assert_eq!(download_bytes(&cluster, "my summer photos.zip").await, data);
}

#[tokio::test]
async fn filename_is_sanitized_on_registration() {
    let cluster = TestCluster::spawn(2).await;
    let data = b"sneaky".to_vec();
    upload_bytes(&cluster, "../etc/passwd", &data).await;

    // The listing shows exactly the sanitized name.
    let files = cluster.client().list_files().await.unwrap();
    assert_eq!(files[0].0, "..etcpasswd");

    // Both spellings resolve to the same record on download.
    assert_eq!(download_bytes(&cluster, "..etcpasswd").await, data);
    assert_eq!(download_bytes(&cluster, "../etc/passwd").await, data);
}

#[tokio::test]
async fn reupload_same_name_wins() {
    let cluster = TestCluster::spawn(2).await;
    let first = patterned_bytes(1500);
    let second = patterned_bytes(2500);
    upload_bytes(&cluster, "contested.bin", &first).await;
    upload_bytes(&cluster, "contested.bin", &second).await;

    assert_eq!(download_bytes(&cluster, "contested.bin").await, second);
    let files = cluster.client().list_files().await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].1, 2500);
}

#[tokio::test]
async fn identical_chunks_are_deduplicated_on_nodes() {
    let cluster = TestCluster::spawn(2).await;
    // Two identical 1 MiB windows share one chunk id.
    let data = vec![0x42u8; 2 * CHUNK_SIZE];
    upload_bytes(&cluster, "dedup.bin", &data).await;

    let record = cluster.catalog.lookup("dedup.bin").unwrap();
    assert_eq!(record.chunks[0].chunk_id, record.chunks[1].chunk_id);

    // Each node holds the shared chunk once.
    for node in &cluster.nodes {
        assert_eq!(node.store.list().await.unwrap().len(), 1);
    }

    assert_eq!(download_bytes(&cluster, "dedup.bin").await, data);
}

#[tokio::test]
async fn download_unknown_file_fails() {
    let cluster = TestCluster::spawn(2).await;
    let dir = tempfile::tempdir().unwrap();
    let result = cluster
        .downloader()
        .download("never-uploaded.bin", &dir.path().join("out.bin"))
        .await;
    assert!(matches!(
        result,
        Err(krill_client::ClientError::Remote(
            krill_proto::ErrorCode::FileNotFound
        ))
    ));
}
