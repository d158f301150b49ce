//! Splitting input data into fixed-size content-addressed chunks.

use std::path::Path;

use bytes::Bytes;
use krill_types::{CHUNK_SIZE, Chunk};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::ChunkError;

/// Split an in-memory buffer into fixed-size chunks.
///
/// Each chunk's id is the SHA-256 of its payload. The last chunk may be
/// shorter than [`CHUNK_SIZE`]; empty input produces zero chunks.
pub fn split_bytes(data: &[u8]) -> Vec<Chunk> {
    data.chunks(CHUNK_SIZE)
        .enumerate()
        .map(|(index, window)| Chunk::from_data(index as u64, Bytes::copy_from_slice(window)))
        .collect()
}

/// Split an async reader into fixed-size chunks, reading to EOF.
///
/// Each window is filled completely before hashing, so a slow reader that
/// returns short reads still produces full 1 MiB chunks everywhere except
/// the tail.
pub async fn split_reader(
    mut reader: impl AsyncRead + Unpin,
) -> Result<Vec<Chunk>, ChunkError> {
    let mut chunks = Vec::new();
    let mut index = 0u64;

    loop {
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut filled = 0;

        while filled < CHUNK_SIZE {
            let n = reader.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == 0 {
            break;
        }

        buf.truncate(filled);
        chunks.push(Chunk::from_data(index, Bytes::from(buf)));
        index += 1;

        if filled < CHUNK_SIZE {
            break;
        }
    }

    Ok(chunks)
}

/// Split a file on disk into chunks.
pub async fn split_file(path: impl AsRef<Path>) -> Result<Vec<Chunk>, ChunkError> {
    let file = tokio::fs::File::open(path.as_ref()).await?;
    split_reader(file).await
}
