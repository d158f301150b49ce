//! Wire client for the metadata coordinator.
//!
//! Every operation opens its own connection, sends one request, reads the
//! reply and closes, mirroring the coordinator's one-request-per-connection
//! worker model.

use std::collections::HashMap;
use std::net::SocketAddr;

use krill_proto::{
    ChunkLocations, END_CHUNKS, END_FILES, END_NODES, ErrorCode, Request, encode_placement_row,
    parse_file_row, parse_location_row, parse_node_row, parse_node_status_row, read_line,
    write_line, write_text,
};
use krill_types::{ChunkPlacement, NodeEndpoint, NodeId, TEXT_TIMEOUT};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::ClientError;

/// The chunk table and endpoint cache returned by `REQUEST_DOWNLOAD`.
#[derive(Debug)]
pub struct DownloadPlan {
    /// Total file size in bytes.
    pub total_size: u64,
    /// Per-chunk replica locations, in coordinator order.
    pub chunks: Vec<ChunkLocations>,
    /// `nodeId → endpoint` cache populated from the inline tuples.
    pub endpoints: HashMap<NodeId, NodeEndpoint>,
}

/// Client for the coordinator's request/response protocol.
#[derive(Debug, Clone)]
pub struct CoordinatorClient {
    addr: SocketAddr,
}

impl CoordinatorClient {
    /// Create a client for the coordinator at `addr`.
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    /// The coordinator address this client talks to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    async fn connect(&self) -> Result<TcpStream, ClientError> {
        let stream = tokio::time::timeout(TEXT_TIMEOUT, TcpStream::connect(self.addr))
            .await
            .map_err(|_| ClientError::Proto(krill_proto::ProtoError::Timeout))??;
        Ok(stream)
    }

    // -------------------------------------------------------------------
    // Storage-node push operations
    // -------------------------------------------------------------------

    /// Register a storage node, returning its assigned id.
    pub async fn register_node(
        &self,
        ip: &str,
        port: u16,
        free_space: u64,
    ) -> Result<NodeId, ClientError> {
        let mut stream = self.connect().await?;
        let request = Request::RegisterNode {
            ip: ip.to_string(),
            port,
            free_space,
        };
        write_line(&mut stream, &request.encode()).await?;

        let reply = read_line(&mut stream).await?;
        let rest = expect_ok(&reply, "REGISTER_RESPONSE")?;
        let token = rest
            .first()
            .ok_or_else(|| ClientError::UnexpectedReply(reply.clone()))?;
        let node_id: NodeId = token
            .parse()
            .map_err(|_| ClientError::UnexpectedReply(reply.clone()))?;
        debug!(%node_id, "registered with coordinator");
        Ok(node_id)
    }

    /// Push a keep-alive for a registered node.
    pub async fn keep_alive(&self, node_id: &NodeId) -> Result<(), ClientError> {
        let mut stream = self.connect().await?;
        let request = Request::KeepAlive {
            node_id: node_id.clone(),
        };
        write_line(&mut stream, &request.encode()).await?;
        let reply = read_line(&mut stream).await?;
        expect_ok(&reply, "KEEP_ALIVE_RESPONSE")?;
        Ok(())
    }

    /// Report a node's current free space.
    pub async fn update_space(&self, node_id: &NodeId, free_space: u64) -> Result<(), ClientError> {
        let mut stream = self.connect().await?;
        let request = Request::UpdateSpace {
            node_id: node_id.clone(),
            free_space,
        };
        write_line(&mut stream, &request.encode()).await?;
        let reply = read_line(&mut stream).await?;
        expect_ok(&reply, "UPDATE_SPACE_RESPONSE")?;
        Ok(())
    }

    // -------------------------------------------------------------------
    // Client operations
    // -------------------------------------------------------------------

    /// Ask for placement candidates for an upload.
    pub async fn request_upload(
        &self,
        filename: &str,
        size: u64,
    ) -> Result<Vec<NodeEndpoint>, ClientError> {
        let mut stream = self.connect().await?;
        let request = Request::RequestUpload {
            filename: filename.to_string(),
            size,
        };
        write_line(&mut stream, &request.encode()).await?;

        let reply = read_line(&mut stream).await?;
        let rest = expect_ok(&reply, "UPLOAD_RESPONSE")?;
        let count: usize = rest
            .first()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| ClientError::UnexpectedReply(reply.clone()))?;

        let mut nodes = Vec::with_capacity(count);
        for _ in 0..count {
            let row = read_line(&mut stream).await?;
            nodes.push(parse_node_row(&row)?);
        }
        Ok(nodes)
    }

    /// Report a finished upload: the filename and its chunk table.
    pub async fn upload_complete(
        &self,
        filename: &str,
        placements: &[ChunkPlacement],
    ) -> Result<(), ClientError> {
        let mut stream = self.connect().await?;

        let mut message = format!("UPLOAD_COMPLETE {filename}\r\n");
        for placement in placements {
            message.push_str(&encode_placement_row(placement));
            message.push_str("\r\n");
        }
        message.push_str(END_CHUNKS);
        message.push_str("\r\n");
        write_text(&mut stream, &message).await?;

        let reply = read_line(&mut stream).await?;
        expect_ok(&reply, "UPLOAD_COMPLETE_RESPONSE")?;
        Ok(())
    }

    /// Fetch a file's chunk table for download.
    pub async fn request_download(&self, filename: &str) -> Result<DownloadPlan, ClientError> {
        let mut stream = self.connect().await?;
        let request = Request::RequestDownload {
            filename: filename.to_string(),
        };
        write_line(&mut stream, &request.encode()).await?;

        let reply = read_line(&mut stream).await?;
        let rest = expect_ok(&reply, "DOWNLOAD_RESPONSE")?;
        if rest.len() < 2 {
            return Err(ClientError::UnexpectedReply(reply));
        }
        let total_size: u64 = rest[0]
            .parse()
            .map_err(|_| ClientError::UnexpectedReply(reply.clone()))?;
        let count: usize = rest[1]
            .parse()
            .map_err(|_| ClientError::UnexpectedReply(reply.clone()))?;

        let mut chunks = Vec::with_capacity(count);
        let mut endpoints = HashMap::new();
        loop {
            let row = read_line(&mut stream).await?;
            if row == END_CHUNKS {
                break;
            }
            let locations = parse_location_row(&row)?;
            for replica in &locations.replicas {
                if let Some((ip, port)) = &replica.endpoint {
                    endpoints.insert(
                        replica.node_id.clone(),
                        NodeEndpoint {
                            node_id: replica.node_id.clone(),
                            ip: ip.clone(),
                            port: *port,
                            free_space: 0,
                        },
                    );
                }
            }
            chunks.push(locations);
        }

        Ok(DownloadPlan {
            total_size,
            chunks,
            endpoints,
        })
    }

    /// List registered files as `(filename, size)` pairs.
    pub async fn list_files(&self) -> Result<Vec<(String, u64)>, ClientError> {
        let mut stream = self.connect().await?;
        write_line(&mut stream, &Request::ListFiles.encode()).await?;

        let reply = read_line(&mut stream).await?;
        expect_ok(&reply, "LIST_FILES_RESPONSE")?;

        let mut files = Vec::new();
        loop {
            let row = read_line(&mut stream).await?;
            if row == END_FILES {
                break;
            }
            files.push(parse_file_row(&row)?);
        }
        Ok(files)
    }

    /// List all registered nodes with their active flags.
    pub async fn list_nodes(&self) -> Result<Vec<(NodeEndpoint, bool)>, ClientError> {
        let mut stream = self.connect().await?;
        write_line(&mut stream, &Request::ListNodes.encode()).await?;

        let reply = read_line(&mut stream).await?;
        expect_ok(&reply, "LIST_NODES_RESPONSE")?;

        let mut nodes = Vec::new();
        loop {
            let row = read_line(&mut stream).await?;
            if row == END_NODES {
                break;
            }
            nodes.push(parse_node_status_row(&row)?);
        }
        Ok(nodes)
    }
}

/// Check a reply line against the expected verb.
///
/// `<VERB> OK rest...` yields the trailing tokens. `<VERB> ERROR <code>`
/// and the bare `ERROR <code> <message>` shape both surface as
/// [`ClientError::Remote`].
fn expect_ok(line: &str, verb: &str) -> Result<Vec<String>, ClientError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    match tokens.as_slice() {
        [first, "OK", rest @ ..] if *first == verb => {
            Ok(rest.iter().map(|t| t.to_string()).collect())
        }
        [first, "ERROR", code, ..] if *first == verb => {
            Err(ClientError::Remote(code.parse::<ErrorCode>()?))
        }
        ["ERROR", code, ..] => Err(ClientError::Remote(code.parse::<ErrorCode>()?)),
        _ => Err(ClientError::UnexpectedReply(line.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use krill_types::ChunkId;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    use super::*;

    /// Serve one connection with a canned reply, after consuming the
    /// request line (and for UPLOAD_COMPLETE, the record lines).
    async fn fake_coordinator(reply: &'static str) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let first = read_line(&mut stream).await.unwrap();
            if first.starts_with("UPLOAD_COMPLETE") {
                loop {
                    let line = read_line(&mut stream).await.unwrap();
                    if line == END_CHUNKS {
                        break;
                    }
                }
            }
            stream.write_all(reply.as_bytes()).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn test_register_node_parses_id() {
        let addr = fake_coordinator("REGISTER_RESPONSE OK 18ffab99\r\n").await;
        let client = CoordinatorClient::new(addr);
        let id = client.register_node("127.0.0.1", 9000, 100).await.unwrap();
        assert_eq!(id.as_str(), "18ffab99");
    }

    #[tokio::test]
    async fn test_keep_alive_ok() {
        let addr = fake_coordinator("KEEP_ALIVE_RESPONSE OK\r\n").await;
        let client = CoordinatorClient::new(addr);
        client.keep_alive(&"n1".parse().unwrap()).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_space_unknown_node() {
        let addr = fake_coordinator("UPDATE_SPACE_RESPONSE ERROR NODE_NOT_FOUND\r\n").await;
        let client = CoordinatorClient::new(addr);
        let err = client
            .update_space(&"ghost".parse().unwrap(), 5)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Remote(ErrorCode::NodeNotFound)
        ));
    }

    #[tokio::test]
    async fn test_request_upload_parses_nodes() {
        let addr = fake_coordinator(
            "UPLOAD_RESPONSE OK 2\r\nn1 127.0.0.1 9001 500\r\nn2 127.0.0.1 9002 400\r\n",
        )
        .await;
        let client = CoordinatorClient::new(addr);
        let nodes = client.request_upload("f.bin", 100).await.unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].node_id.as_str(), "n1");
        assert_eq!(nodes[1].port, 9002);
    }

    #[tokio::test]
    async fn test_request_upload_insufficient_nodes() {
        let addr = fake_coordinator("UPLOAD_RESPONSE ERROR INSUFFICIENT_NODES\r\n").await;
        let client = CoordinatorClient::new(addr);
        let err = client.request_upload("f.bin", 100).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Remote(ErrorCode::InsufficientNodes)
        ));
    }

    #[tokio::test]
    async fn test_upload_complete_ok() {
        let addr = fake_coordinator("UPLOAD_COMPLETE_RESPONSE OK\r\n").await;
        let client = CoordinatorClient::new(addr);
        let placements = vec![ChunkPlacement {
            chunk_id: ChunkId::from_data(b"c0"),
            index: 0,
            size: 10,
            node_ids: vec!["n1".parse().unwrap(), "n2".parse().unwrap()],
        }];
        client.upload_complete("f.bin", &placements).await.unwrap();
    }

    #[tokio::test]
    async fn test_request_download_builds_plan() {
        let id = ChunkId::from_data(b"dl");
        let reply: &'static str = Box::leak(
            format!(
                "DOWNLOAD_RESPONSE OK 10 1\r\n{id} 0 10 n1 127.0.0.1 9001 n2 127.0.0.1 9002\r\nEND_CHUNKS\r\n"
            )
            .into_boxed_str(),
        );
        let addr = fake_coordinator(reply).await;
        let client = CoordinatorClient::new(addr);
        let plan = client.request_download("f.bin").await.unwrap();

        assert_eq!(plan.total_size, 10);
        assert_eq!(plan.chunks.len(), 1);
        assert_eq!(plan.chunks[0].replicas.len(), 2);
        assert_eq!(plan.endpoints.len(), 2);
        assert_eq!(plan.endpoints[&"n2".parse().unwrap()].port, 9002);
    }

    #[tokio::test]
    async fn test_request_download_not_found() {
        let addr = fake_coordinator("DOWNLOAD_RESPONSE ERROR FILE_NOT_FOUND\r\n").await;
        let client = CoordinatorClient::new(addr);
        let err = client.request_download("nope").await.unwrap_err();
        assert!(matches!(err, ClientError::Remote(ErrorCode::FileNotFound)));
    }

    #[tokio::test]
    async fn test_list_files_with_spaced_names() {
        let addr = fake_coordinator(
            "LIST_FILES_RESPONSE OK 2\r\nmy summer photos.zip 42\r\nplain.bin 7\r\nEND_FILES\r\n",
        )
        .await;
        let client = CoordinatorClient::new(addr);
        let files = client.list_files().await.unwrap();
        assert_eq!(
            files,
            vec![
                ("my summer photos.zip".to_string(), 42),
                ("plain.bin".to_string(), 7)
            ]
        );
    }

    #[tokio::test]
    async fn test_list_nodes_parses_active_flag() {
        let addr = fake_coordinator(
            "LIST_NODES_RESPONSE OK 2\r\nn1 127.0.0.1 9001 500 1\r\nn2 127.0.0.1 9002 400 0\r\nEND_NODES\r\n",
        )
        .await;
        let client = CoordinatorClient::new(addr);
        let nodes = client.list_nodes().await.unwrap();
        assert!(nodes[0].1);
        assert!(!nodes[1].1);
    }

    #[tokio::test]
    async fn test_bare_error_line() {
        let addr = fake_coordinator("ERROR INVALID_COMMAND Unknown command: X\r\n").await;
        let client = CoordinatorClient::new(addr);
        let err = client.list_files().await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Remote(ErrorCode::InvalidCommand)
        ));
    }

    #[tokio::test]
    async fn test_garbage_reply_is_unexpected() {
        let addr = fake_coordinator("WAT\r\n").await;
        let client = CoordinatorClient::new(addr);
        let err = client.list_files().await.unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedReply(_)));
    }
}
