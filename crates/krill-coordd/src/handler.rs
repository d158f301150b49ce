//! Per-connection request dispatch for the coordinator.
//!
//! Each worker services exactly one request: read the first CRLF line,
//! dispatch on its verb, write the reply, close. `UPLOAD_COMPLETE` is the
//! one inbound multi-line exchange: the handler keeps reading placement
//! rows off the same connection until `END_CHUNKS`.

use std::sync::Arc;

use krill_meta::{FileCatalog, NodeRegistry};
use krill_proto::{
    ChunkLocations, ChunkReplica, END_CHUNKS, END_FILES, END_NODES, ProtoError, Request,
    encode_file_row, encode_location_row, encode_node_row, encode_node_status_row,
    parse_placement_row, read_line, response_verb, write_text,
};
use krill_types::{CHUNK_SIZE, REPLICATION_FACTOR, chunk_count};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

/// Cap on placement rows in one `UPLOAD_COMPLETE`, matching the original
/// protocol's runaway-manifest guard.
const MAX_MANIFEST_ROWS: usize = 10_000;

/// Shared coordinator state handed to every connection worker.
pub struct Coordinator {
    registry: Arc<NodeRegistry>,
    catalog: Arc<FileCatalog>,
}

impl Coordinator {
    /// Create a coordinator over the given tables.
    pub fn new(registry: Arc<NodeRegistry>, catalog: Arc<FileCatalog>) -> Self {
        Self { registry, catalog }
    }

    /// The node registry.
    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// The file catalog.
    pub fn catalog(&self) -> &Arc<FileCatalog> {
        &self.catalog
    }

    /// Service one connection: one request, one reply.
    pub async fn handle_connection<S>(&self, stream: &mut S, peer: &str)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        info!(peer, "client connected");
        if let Err(e) = self.serve_one(stream).await {
            debug!(peer, %e, "connection ended with error");
        }
        info!(peer, "client disconnected");
    }

    async fn serve_one<S>(&self, stream: &mut S) -> Result<(), ProtoError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let first_line = read_line(stream).await?;
        debug!(request = %first_line, "received command");

        let reply = match Request::parse(&first_line) {
            Ok(Request::UploadComplete { filename }) => {
                self.handle_upload_complete(&filename, stream).await
            }
            Ok(request) => self.dispatch(request),
            Err(ProtoError::UnknownCommand(command)) => {
                if command.is_empty() {
                    "ERROR INVALID_COMMAND Empty request\r\n".to_string()
                } else {
                    format!("ERROR INVALID_COMMAND Unknown command: {command}\r\n")
                }
            }
            Err(ProtoError::InvalidParameters { command, detail }) => {
                debug!(command, detail = %detail, "rejected request parameters");
                match response_verb(command) {
                    Some(verb) => format!("{verb} ERROR INVALID_PARAMETERS\r\n"),
                    None => "ERROR INVALID_PARAMETERS bad request\r\n".to_string(),
                }
            }
            Err(e) => return Err(e),
        };

        write_text(stream, &reply).await
    }

    fn dispatch(&self, request: Request) -> String {
        match request {
            Request::RegisterNode {
                ip,
                port,
                free_space,
            } => match self.registry.register(&ip, port, free_space) {
                Ok(node_id) => format!("REGISTER_RESPONSE OK {node_id}\r\n"),
                Err(e) => {
                    warn!(%ip, port, %e, "node registration rejected");
                    "REGISTER_RESPONSE ERROR REGISTRATION_FAILED\r\n".to_string()
                }
            },

            Request::KeepAlive { node_id } => {
                self.registry.keep_alive(&node_id);
                "KEEP_ALIVE_RESPONSE OK\r\n".to_string()
            }

            Request::UpdateSpace {
                node_id,
                free_space,
            } => match self.registry.update_space(&node_id, free_space) {
                Ok(()) => "UPDATE_SPACE_RESPONSE OK\r\n".to_string(),
                Err(_) => "UPDATE_SPACE_RESPONSE ERROR NODE_NOT_FOUND\r\n".to_string(),
            },

            Request::RequestUpload { filename, size } => self.handle_request_upload(&filename, size),

            Request::RequestDownload { filename } => self.handle_request_download(&filename),

            Request::ListFiles => {
                let listing = self.catalog.list();
                let mut reply = format!("LIST_FILES_RESPONSE OK {}\r\n", listing.len());
                for (filename, size) in &listing {
                    reply.push_str(&encode_file_row(filename, *size));
                    reply.push_str("\r\n");
                }
                reply.push_str(END_FILES);
                reply.push_str("\r\n");
                reply
            }

            Request::ListNodes => {
                let nodes = self.registry.list_all();
                let timeout = self.registry.node_timeout();
                let mut reply = format!("LIST_NODES_RESPONSE OK {}\r\n", nodes.len());
                for node in &nodes {
                    let live = node.is_active && node.last_seen.elapsed() <= timeout;
                    reply.push_str(&encode_node_status_row(&node.endpoint(), live));
                    reply.push_str("\r\n");
                }
                reply.push_str(END_NODES);
                reply.push_str("\r\n");
                reply
            }

            // Handled by the multi-line path before dispatch.
            Request::UploadComplete { .. } => unreachable!("multi-line request"),
        }
    }

    fn handle_request_upload(&self, filename: &str, size: u64) -> String {
        // One candidate per replica of every chunk; an empty file still
        // needs a full replica set so the client can proceed uniformly.
        let required = chunk_count(size).max(1) as usize * REPLICATION_FACTOR;
        let candidates = self
            .registry
            .select_available(required, CHUNK_SIZE as u64);
        info!(
            filename,
            size,
            required,
            candidates = candidates.len(),
            "placement query"
        );

        if candidates.len() < REPLICATION_FACTOR {
            warn!(
                filename,
                candidates = candidates.len(),
                needed = REPLICATION_FACTOR,
                "insufficient nodes for upload"
            );
            return "UPLOAD_RESPONSE ERROR INSUFFICIENT_NODES\r\n".to_string();
        }

        let mut reply = format!("UPLOAD_RESPONSE OK {}\r\n", candidates.len());
        for node in &candidates {
            reply.push_str(&encode_node_row(&node.endpoint()));
            reply.push_str("\r\n");
        }
        reply
    }

    fn handle_request_download(&self, filename: &str) -> String {
        let Some(record) = self.catalog.lookup(filename) else {
            return "DOWNLOAD_RESPONSE ERROR FILE_NOT_FOUND\r\n".to_string();
        };

        let mut reply = format!(
            "DOWNLOAD_RESPONSE OK {} {}\r\n",
            record.total_size,
            record.chunks.len()
        );
        for placement in &record.chunks {
            let replicas = placement
                .node_ids
                .iter()
                .map(|node_id| ChunkReplica {
                    node_id: node_id.clone(),
                    endpoint: self
                        .registry
                        .get(node_id)
                        .map(|node| (node.ip, node.port)),
                })
                .collect();
            let locations = ChunkLocations {
                chunk_id: placement.chunk_id,
                index: placement.index,
                size: placement.size,
                replicas,
            };
            reply.push_str(&encode_location_row(&locations));
            reply.push_str("\r\n");
        }
        reply.push_str(END_CHUNKS);
        reply.push_str("\r\n");
        reply
    }

    /// Read placement rows until `END_CHUNKS`, then register the manifest.
    /// Malformed rows are skipped, as the original protocol does.
    async fn handle_upload_complete<S>(&self, filename: &str, stream: &mut S) -> String
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut placements = Vec::new();
        let mut rows = 0usize;

        loop {
            let line = match read_line(stream).await {
                Ok(line) => line,
                Err(e) => {
                    warn!(filename, %e, "failed reading manifest rows");
                    return "UPLOAD_COMPLETE_RESPONSE ERROR READ_ERROR\r\n".to_string();
                }
            };
            if line == END_CHUNKS {
                break;
            }
            rows += 1;
            if rows > MAX_MANIFEST_ROWS {
                warn!(filename, "manifest exceeds row cap");
                return "UPLOAD_COMPLETE_RESPONSE ERROR READ_ERROR\r\n".to_string();
            }
            match parse_placement_row(&line) {
                Ok(placement) => placements.push(placement),
                Err(e) => debug!(filename, %e, "skipping malformed placement row"),
            }
        }

        let total_size: u64 = placements.iter().map(|p| p.size).sum();
        match self.catalog.register(filename, total_size, placements) {
            Ok(sanitized) => {
                info!(filename = %sanitized, total_size, "upload registered");
                "UPLOAD_COMPLETE_RESPONSE OK\r\n".to_string()
            }
            Err(e) => {
                warn!(filename, %e, "manifest registration rejected");
                "UPLOAD_COMPLETE_RESPONSE ERROR REGISTRATION_FAILED\r\n".to_string()
            }
        }
    }
}
