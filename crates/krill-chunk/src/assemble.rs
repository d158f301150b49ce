//! Reassembling a verified chunk sequence into a file.

use std::path::Path;

use krill_types::Chunk;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::ChunkError;

/// Write a chunk sequence back out as a file.
///
/// The sequence is sorted by index and must form exactly `[0, N-1]`; every
/// payload is re-hashed against its id before anything is written. The
/// output is opened for truncating write, so a failed earlier download
/// cannot leak stale bytes into the result. An empty sequence produces an
/// empty file.
pub async fn reassemble(chunks: &[Chunk], path: impl AsRef<Path>) -> Result<(), ChunkError> {
    let mut ordered: Vec<&Chunk> = chunks.iter().collect();
    ordered.sort_by_key(|c| c.index);

    for (position, chunk) in ordered.iter().enumerate() {
        if chunk.index != position as u64 {
            return Err(ChunkError::BrokenSequence {
                expected: position as u64,
                found: chunk.index,
            });
        }
        if !chunk.verify() {
            return Err(ChunkError::DigestMismatch { index: chunk.index });
        }
    }

    let mut file = tokio::fs::File::create(path.as_ref()).await?;
    for chunk in &ordered {
        file.write_all(&chunk.data).await?;
    }
    file.flush().await?;

    debug!(
        chunks = ordered.len(),
        path = %path.as_ref().display(),
        "reassembled file"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use krill_types::ChunkId;

    use super::*;
    use crate::split::split_bytes;

    async fn roundtrip(data: &[u8]) -> Vec<u8> {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.bin");
        let chunks = split_bytes(data);
        reassemble(&chunks, &out).await.unwrap();
        tokio::fs::read(&out).await.unwrap()
    }

    #[tokio::test]
    async fn test_split_reassemble_identity() {
        let mut data = Vec::new();
        for i in 0..(2 * krill_types::CHUNK_SIZE + 333) {
            data.push((i % 256) as u8);
        }
        assert_eq!(roundtrip(&data).await, data);
    }

    #[tokio::test]
    async fn test_reassemble_empty_sequence_writes_empty_file() {
        assert_eq!(roundtrip(b"").await, Vec::<u8>::new());
    }

    #[tokio::test]
    async fn test_reassemble_any_order() {
        let data = vec![9u8; 3 * krill_types::CHUNK_SIZE];
        let mut chunks = split_bytes(&data);
        chunks.reverse();

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.bin");
        reassemble(&chunks, &out).await.unwrap();
        assert_eq!(tokio::fs::read(&out).await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_reassemble_rejects_gap() {
        let data = vec![1u8; 2 * krill_types::CHUNK_SIZE];
        let mut chunks = split_bytes(&data);
        chunks.remove(0);

        let dir = tempfile::tempdir().unwrap();
        let result = reassemble(&chunks, dir.path().join("out.bin")).await;
        assert!(matches!(
            result,
            Err(ChunkError::BrokenSequence {
                expected: 0,
                found: 1
            })
        ));
    }

    #[tokio::test]
    async fn test_reassemble_rejects_duplicate_index() {
        let data = vec![1u8; 2 * krill_types::CHUNK_SIZE];
        let mut chunks = split_bytes(&data);
        chunks[1].index = 0;

        let dir = tempfile::tempdir().unwrap();
        let result = reassemble(&chunks, dir.path().join("out.bin")).await;
        assert!(matches!(result, Err(ChunkError::BrokenSequence { .. })));
    }

    #[tokio::test]
    async fn test_reassemble_rejects_digest_mismatch() {
        let mut chunks = split_bytes(b"some chunk data");
        chunks[0].id = ChunkId::from_data(b"a different payload");

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.bin");
        let result = reassemble(&chunks, &out).await;
        assert!(matches!(
            result,
            Err(ChunkError::DigestMismatch { index: 0 })
        ));
        // Nothing may be written on a rejected sequence.
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn test_reassemble_truncates_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.bin");
        tokio::fs::write(&out, vec![0xFFu8; 1024]).await.unwrap();

        let chunks = vec![Chunk::from_data(0, Bytes::from_static(b"short"))];
        reassemble(&chunks, &out).await.unwrap();
        assert_eq!(tokio::fs::read(&out).await.unwrap(), b"short");
    }
}
