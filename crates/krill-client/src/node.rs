//! Wire client for storage node chunk transfers.
//!
//! Each transfer is its own short-lived connection: command line out, reply
//! line back, payload bytes in whichever direction the command implies.

use std::net::SocketAddr;

use bytes::Bytes;
use krill_proto::{
    ErrorCode, NodeCommand, read_line, read_payload, write_line, write_payload,
};
use krill_types::{BINARY_TIMEOUT, Chunk, ChunkId, NodeEndpoint};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::ClientError;

fn socket_addr(endpoint: &NodeEndpoint) -> Result<SocketAddr, ClientError> {
    format!("{}:{}", endpoint.ip, endpoint.port)
        .parse()
        .map_err(|_| ClientError::BadEndpoint(format!("{}:{}", endpoint.ip, endpoint.port)))
}

async fn connect(endpoint: &NodeEndpoint) -> Result<TcpStream, ClientError> {
    let addr = socket_addr(endpoint)?;
    let stream = tokio::time::timeout(BINARY_TIMEOUT, TcpStream::connect(addr))
        .await
        .map_err(|_| ClientError::Proto(krill_proto::ProtoError::Timeout))??;
    Ok(stream)
}

/// Store a chunk on a node. Succeeds only on `STORE_RESPONSE OK`.
pub async fn store_chunk(endpoint: &NodeEndpoint, chunk: &Chunk) -> Result<(), ClientError> {
    let mut stream = connect(endpoint).await?;
    let command = NodeCommand::StoreChunk {
        chunk_id: chunk.id,
        size: chunk.len() as u64,
    };
    write_line(&mut stream, &command.encode()).await?;
    write_payload(&mut stream, &chunk.data).await?;

    let reply = read_line(&mut stream).await?;
    match reply.split_whitespace().collect::<Vec<_>>().as_slice() {
        ["STORE_RESPONSE", "OK", ..] => {
            debug!(chunk_id = %chunk.id, node = %endpoint.node_id, "stored chunk");
            Ok(())
        }
        ["STORE_RESPONSE", "ERROR", code, ..] => {
            Err(ClientError::Remote(code.parse::<ErrorCode>()?))
        }
        _ => Err(ClientError::UnexpectedReply(reply)),
    }
}

/// Fetch a chunk's bytes from a node.
///
/// Returns the raw payload as announced by `GET_RESPONSE OK <size>`. The
/// caller is responsible for digest verification; a lying node is caught
/// there, not here.
pub async fn get_chunk(endpoint: &NodeEndpoint, chunk_id: &ChunkId) -> Result<Bytes, ClientError> {
    let mut stream = connect(endpoint).await?;
    let command = NodeCommand::GetChunk {
        chunk_id: *chunk_id,
    };
    write_line(&mut stream, &command.encode()).await?;

    let reply = read_line(&mut stream).await?;
    let tokens: Vec<&str> = reply.split_whitespace().collect();
    match tokens.as_slice() {
        ["GET_RESPONSE", "OK", size] => {
            let size: usize = size
                .parse()
                .map_err(|_| ClientError::UnexpectedReply(reply.clone()))?;
            Ok(read_payload(&mut stream, size).await?)
        }
        ["GET_RESPONSE", "ERROR", code, ..] => Err(ClientError::Remote(code.parse::<ErrorCode>()?)),
        _ => Err(ClientError::UnexpectedReply(reply)),
    }
}

/// Ask a node whether it holds a chunk.
pub async fn check_chunk(
    endpoint: &NodeEndpoint,
    chunk_id: &ChunkId,
) -> Result<bool, ClientError> {
    let mut stream = connect(endpoint).await?;
    let command = NodeCommand::CheckChunk {
        chunk_id: *chunk_id,
    };
    write_line(&mut stream, &command.encode()).await?;

    let reply = read_line(&mut stream).await?;
    match reply.split_whitespace().collect::<Vec<_>>().as_slice() {
        ["CHECK_RESPONSE", "EXISTS"] => Ok(true),
        ["CHECK_RESPONSE", "MISSING"] => Ok(false),
        _ => Err(ClientError::UnexpectedReply(reply)),
    }
}
