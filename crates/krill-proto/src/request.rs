//! Typed parsers for the coordinator request verbs and storage-node
//! commands.
//!
//! Tokens are whitespace-separated. Filenames may contain internal spaces:
//! for `REQUEST_UPLOAD` the final token is the numeric size and everything
//! between the verb and the size is the filename; for `REQUEST_DOWNLOAD`
//! and `UPLOAD_COMPLETE` all trailing tokens are the filename.

use krill_types::{ChunkId, NodeId};

use crate::error::ProtoError;

/// A request received by the coordinator, parsed from its first line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// `REGISTER_NODE <ip> <port> <freeSpace>`
    RegisterNode {
        /// Advertised IPv4 address of the storage node.
        ip: String,
        /// Advertised chunk-transfer port.
        port: u16,
        /// Free space in bytes.
        free_space: u64,
    },
    /// `KEEP_ALIVE <nodeId>`
    KeepAlive {
        /// The node refreshing its liveness.
        node_id: NodeId,
    },
    /// `UPDATE_SPACE <nodeId> <freeSpace>`
    UpdateSpace {
        /// The node reporting.
        node_id: NodeId,
        /// New free space in bytes.
        free_space: u64,
    },
    /// `REQUEST_UPLOAD <filename> <size>`
    RequestUpload {
        /// Remote filename (may contain spaces).
        filename: String,
        /// Total file size in bytes.
        size: u64,
    },
    /// `UPLOAD_COMPLETE <filename>`, followed by placement record lines
    /// up to `END_CHUNKS`, which the caller reads separately.
    UploadComplete {
        /// Remote filename (may contain spaces).
        filename: String,
    },
    /// `REQUEST_DOWNLOAD <filename>`
    RequestDownload {
        /// Remote filename (may contain spaces).
        filename: String,
    },
    /// `LIST_FILES`
    ListFiles,
    /// `LIST_NODES`
    ListNodes,
}

impl Request {
    /// Parse a request from its first line.
    pub fn parse(line: &str) -> Result<Self, ProtoError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&command) = tokens.first() else {
            return Err(ProtoError::UnknownCommand(String::new()));
        };

        match command {
            "REGISTER_NODE" => {
                if tokens.len() != 4 {
                    return Err(bad_arity("REGISTER_NODE", 3, tokens.len() - 1));
                }
                Ok(Request::RegisterNode {
                    ip: tokens[1].to_string(),
                    port: parse_num(tokens[2], "REGISTER_NODE")?,
                    free_space: parse_num(tokens[3], "REGISTER_NODE")?,
                })
            }
            "KEEP_ALIVE" => {
                if tokens.len() != 2 {
                    return Err(bad_arity("KEEP_ALIVE", 1, tokens.len() - 1));
                }
                Ok(Request::KeepAlive {
                    node_id: parse_node_id(tokens[1], "KEEP_ALIVE")?,
                })
            }
            "UPDATE_SPACE" => {
                if tokens.len() != 3 {
                    return Err(bad_arity("UPDATE_SPACE", 2, tokens.len() - 1));
                }
                Ok(Request::UpdateSpace {
                    node_id: parse_node_id(tokens[1], "UPDATE_SPACE")?,
                    free_space: parse_num(tokens[2], "UPDATE_SPACE")?,
                })
            }
            "REQUEST_UPLOAD" => {
                if tokens.len() < 3 {
                    return Err(bad_arity("REQUEST_UPLOAD", 2, tokens.len() - 1));
                }
                Ok(Request::RequestUpload {
                    filename: tokens[1..tokens.len() - 1].join(" "),
                    size: parse_num(tokens[tokens.len() - 1], "REQUEST_UPLOAD")?,
                })
            }
            "UPLOAD_COMPLETE" => {
                if tokens.len() < 2 {
                    return Err(bad_arity("UPLOAD_COMPLETE", 1, tokens.len() - 1));
                }
                Ok(Request::UploadComplete {
                    filename: tokens[1..].join(" "),
                })
            }
            "REQUEST_DOWNLOAD" => {
                if tokens.len() < 2 {
                    return Err(bad_arity("REQUEST_DOWNLOAD", 1, tokens.len() - 1));
                }
                Ok(Request::RequestDownload {
                    filename: tokens[1..].join(" "),
                })
            }
            "LIST_FILES" => Ok(Request::ListFiles),
            "LIST_NODES" => Ok(Request::ListNodes),
            other => Err(ProtoError::UnknownCommand(other.to_string())),
        }
    }

    /// Render the request as its wire line (without CRLF).
    pub fn encode(&self) -> String {
        match self {
            Request::RegisterNode {
                ip,
                port,
                free_space,
            } => format!("REGISTER_NODE {ip} {port} {free_space}"),
            Request::KeepAlive { node_id } => format!("KEEP_ALIVE {node_id}"),
            Request::UpdateSpace {
                node_id,
                free_space,
            } => format!("UPDATE_SPACE {node_id} {free_space}"),
            Request::RequestUpload { filename, size } => {
                format!("REQUEST_UPLOAD {filename} {size}")
            }
            Request::UploadComplete { filename } => format!("UPLOAD_COMPLETE {filename}"),
            Request::RequestDownload { filename } => format!("REQUEST_DOWNLOAD {filename}"),
            Request::ListFiles => "LIST_FILES".to_string(),
            Request::ListNodes => "LIST_NODES".to_string(),
        }
    }
}

/// The reply verb a coordinator uses for a given request command, e.g.
/// `REQUEST_UPLOAD` → `UPLOAD_RESPONSE`. Unknown commands have none; they
/// get the bare `ERROR` line instead.
pub fn response_verb(command: &str) -> Option<&'static str> {
    match command {
        "REGISTER_NODE" => Some("REGISTER_RESPONSE"),
        "KEEP_ALIVE" => Some("KEEP_ALIVE_RESPONSE"),
        "UPDATE_SPACE" => Some("UPDATE_SPACE_RESPONSE"),
        "REQUEST_UPLOAD" => Some("UPLOAD_RESPONSE"),
        "UPLOAD_COMPLETE" => Some("UPLOAD_COMPLETE_RESPONSE"),
        "REQUEST_DOWNLOAD" => Some("DOWNLOAD_RESPONSE"),
        "LIST_FILES" => Some("LIST_FILES_RESPONSE"),
        "LIST_NODES" => Some("LIST_NODES_RESPONSE"),
        _ => None,
    }
}

/// A command received by a storage node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeCommand {
    /// `STORE_CHUNK <chunkId> <size>`, with `size` payload bytes following.
    StoreChunk {
        /// Declared identity of the payload.
        chunk_id: ChunkId,
        /// Payload length in bytes.
        size: u64,
    },
    /// `GET_CHUNK <chunkId>`
    GetChunk {
        /// Requested chunk.
        chunk_id: ChunkId,
    },
    /// `CHECK_CHUNK <chunkId>`
    CheckChunk {
        /// Probed chunk.
        chunk_id: ChunkId,
    },
}

impl NodeCommand {
    /// Parse a storage-node command from its first line.
    pub fn parse(line: &str) -> Result<Self, ProtoError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&command) = tokens.first() else {
            return Err(ProtoError::UnknownCommand(String::new()));
        };

        match command {
            "STORE_CHUNK" => {
                if tokens.len() != 3 {
                    return Err(bad_arity("STORE_CHUNK", 2, tokens.len() - 1));
                }
                Ok(NodeCommand::StoreChunk {
                    chunk_id: parse_chunk_id(tokens[1], "STORE_CHUNK")?,
                    size: parse_num(tokens[2], "STORE_CHUNK")?,
                })
            }
            "GET_CHUNK" => {
                if tokens.len() != 2 {
                    return Err(bad_arity("GET_CHUNK", 1, tokens.len() - 1));
                }
                Ok(NodeCommand::GetChunk {
                    chunk_id: parse_chunk_id(tokens[1], "GET_CHUNK")?,
                })
            }
            "CHECK_CHUNK" => {
                if tokens.len() != 2 {
                    return Err(bad_arity("CHECK_CHUNK", 1, tokens.len() - 1));
                }
                Ok(NodeCommand::CheckChunk {
                    chunk_id: parse_chunk_id(tokens[1], "CHECK_CHUNK")?,
                })
            }
            other => Err(ProtoError::UnknownCommand(other.to_string())),
        }
    }

    /// Render the command as its wire line (without CRLF).
    pub fn encode(&self) -> String {
        match self {
            NodeCommand::StoreChunk { chunk_id, size } => {
                format!("STORE_CHUNK {chunk_id} {size}")
            }
            NodeCommand::GetChunk { chunk_id } => format!("GET_CHUNK {chunk_id}"),
            NodeCommand::CheckChunk { chunk_id } => format!("CHECK_CHUNK {chunk_id}"),
        }
    }
}

fn bad_arity(command: &'static str, expected: usize, got: usize) -> ProtoError {
    ProtoError::InvalidParameters {
        command,
        detail: format!("expected {expected} arguments, got {got}"),
    }
}

fn parse_num<T: std::str::FromStr>(token: &str, command: &'static str) -> Result<T, ProtoError> {
    token.parse().map_err(|_| ProtoError::InvalidParameters {
        command,
        detail: format!("not a valid number: {token}"),
    })
}

fn parse_node_id(token: &str, command: &'static str) -> Result<NodeId, ProtoError> {
    token.parse().map_err(|_| ProtoError::InvalidParameters {
        command,
        detail: format!("invalid node id: {token}"),
    })
}

fn parse_chunk_id(token: &str, command: &'static str) -> Result<ChunkId, ProtoError> {
    token.parse().map_err(|_| ProtoError::InvalidParameters {
        command,
        detail: format!("invalid chunk id: {token}"),
    })
}
