//! Chunk-transfer service loop for a storage node.

use std::sync::Arc;

use krill_proto::{
    NodeCommand, ProtoError, read_line, read_payload, write_line, write_payload,
};
use krill_store::{ChunkStore, StoreError};
use krill_types::{CHUNK_SIZE, ChunkId};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Accept chunk-transfer connections until `shutdown` flips.
pub async fn serve_chunks(
    listener: TcpListener,
    store: Arc<dyn ChunkStore>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("chunk listener shutting down");
                break;
            }
            accepted = listener.accept() => {
                let (mut stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(%e, "accept failed");
                        continue;
                    }
                };
                let store = store.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(store.as_ref(), &mut stream).await {
                        debug!(%peer, %e, "chunk connection ended with error");
                    }
                });
            }
        }
    }
}

/// Service one chunk-transfer connection: one command, one reply.
pub async fn handle_connection<S>(
    store: &dyn ChunkStore,
    stream: &mut S,
) -> Result<(), ProtoError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let line = read_line(stream).await?;
    let command = match NodeCommand::parse(&line) {
        Ok(command) => command,
        Err(ProtoError::InvalidParameters { command, .. }) => {
            let verb = match command {
                "STORE_CHUNK" => "STORE_RESPONSE",
                "GET_CHUNK" => "GET_RESPONSE",
                _ => "CHECK_RESPONSE",
            };
            return write_line(stream, &format!("{verb} ERROR INVALID_PARAMETERS")).await;
        }
        Err(ProtoError::UnknownCommand(command)) => {
            return write_line(
                stream,
                &format!("ERROR INVALID_COMMAND Unknown command: {command}"),
            )
            .await;
        }
        Err(e) => return Err(e),
    };

    match command {
        NodeCommand::StoreChunk { chunk_id, size } => {
            handle_store(store, stream, chunk_id, size).await
        }
        NodeCommand::GetChunk { chunk_id } => handle_get(store, stream, &chunk_id).await,
        NodeCommand::CheckChunk { chunk_id } => {
            let reply = match store.contains(&chunk_id).await {
                Ok(true) => "CHECK_RESPONSE EXISTS",
                Ok(false) => "CHECK_RESPONSE MISSING",
                Err(e) => {
                    warn!(%chunk_id, %e, "chunk probe failed");
                    "CHECK_RESPONSE MISSING"
                }
            };
            write_line(stream, reply).await
        }
    }
}

async fn handle_store<S>(
    store: &dyn ChunkStore,
    stream: &mut S,
    chunk_id: ChunkId,
    size: u64,
) -> Result<(), ProtoError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if size == 0 || size > CHUNK_SIZE as u64 {
        return write_line(stream, "STORE_RESPONSE ERROR INVALID_PARAMETERS").await;
    }

    let data = read_payload(stream, size as usize).await?;

    // The payload must actually hash to its declared identity; a corrupted
    // upload is rejected instead of poisoning a replica.
    if ChunkId::from_data(&data) != chunk_id {
        warn!(%chunk_id, "store payload does not hash to its chunk id");
        return write_line(stream, "STORE_RESPONSE ERROR INVALID_PARAMETERS").await;
    }

    match store.put(chunk_id, data).await {
        Ok(()) => {
            debug!(%chunk_id, size, "chunk stored");
            write_line(stream, "STORE_RESPONSE OK").await
        }
        Err(StoreError::CapacityExceeded { .. }) => {
            warn!(%chunk_id, "store rejected: capacity exceeded");
            write_line(stream, "STORE_RESPONSE ERROR INSUFFICIENT_NODES").await
        }
        Err(e) => {
            warn!(%chunk_id, %e, "store failed");
            write_line(stream, "STORE_RESPONSE ERROR READ_ERROR").await
        }
    }
}

async fn handle_get<S>(
    store: &dyn ChunkStore,
    stream: &mut S,
    chunk_id: &ChunkId,
) -> Result<(), ProtoError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match store.get(chunk_id).await {
        Ok(Some(data)) => {
            write_line(stream, &format!("GET_RESPONSE OK {}", data.len())).await?;
            write_payload(stream, &data).await
        }
        Ok(None) => write_line(stream, "GET_RESPONSE ERROR FILE_NOT_FOUND").await,
        Err(e) => {
            warn!(%chunk_id, %e, "chunk read failed");
            write_line(stream, "GET_RESPONSE ERROR READ_ERROR").await
        }
    }
}
