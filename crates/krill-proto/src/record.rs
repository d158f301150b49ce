//! Record-row grammar for the multi-record exchanges.
//!
//! A multi-record exchange is a first line declaring a count, `count`
//! record lines, and (for the downloads and listings) a terminator line.
//! Row shapes:
//!
//! - node row (`UPLOAD_RESPONSE`): `nodeId ip port freeSpace`
//! - node status row (`LIST_NODES`): `nodeId ip port freeSpace isActive`
//! - placement row (`UPLOAD_COMPLETE`): `chunkId index size nodeId+`
//! - location row (`DOWNLOAD_RESPONSE`): `chunkId index size (nodeId ip port)+`
//! - file row (`LIST_FILES`): `filename size` (filename may contain spaces)

use krill_types::{ChunkId, ChunkPlacement, NodeEndpoint, NodeId};

use crate::error::ProtoError;

/// Terminator for chunk record sequences.
pub const END_CHUNKS: &str = "END_CHUNKS";
/// Terminator for file listings.
pub const END_FILES: &str = "END_FILES";
/// Terminator for node listings.
pub const END_NODES: &str = "END_NODES";

// ---------------------------------------------------------------------------
// Node rows
// ---------------------------------------------------------------------------

/// Encode an `UPLOAD_RESPONSE` node row.
pub fn encode_node_row(node: &NodeEndpoint) -> String {
    format!(
        "{} {} {} {}",
        node.node_id, node.ip, node.port, node.free_space
    )
}

/// Parse an `UPLOAD_RESPONSE` node row.
pub fn parse_node_row(line: &str) -> Result<NodeEndpoint, ProtoError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 4 {
        return Err(ProtoError::MalformedRecord(line.to_string()));
    }
    Ok(NodeEndpoint {
        node_id: parse_token(tokens[0], line)?,
        ip: tokens[1].to_string(),
        port: parse_token(tokens[2], line)?,
        free_space: parse_token(tokens[3], line)?,
    })
}

/// Encode a `LIST_NODES` row; `isActive` is rendered as `1` or `0`.
pub fn encode_node_status_row(node: &NodeEndpoint, is_active: bool) -> String {
    format!(
        "{} {} {} {} {}",
        node.node_id,
        node.ip,
        node.port,
        node.free_space,
        if is_active { 1 } else { 0 }
    )
}

/// Parse a `LIST_NODES` row into the endpoint and its active flag.
pub fn parse_node_status_row(line: &str) -> Result<(NodeEndpoint, bool), ProtoError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 5 {
        return Err(ProtoError::MalformedRecord(line.to_string()));
    }
    let endpoint = NodeEndpoint {
        node_id: parse_token(tokens[0], line)?,
        ip: tokens[1].to_string(),
        port: parse_token(tokens[2], line)?,
        free_space: parse_token(tokens[3], line)?,
    };
    let is_active = match tokens[4] {
        "1" => true,
        "0" => false,
        _ => return Err(ProtoError::MalformedRecord(line.to_string())),
    };
    Ok((endpoint, is_active))
}

// ---------------------------------------------------------------------------
// Placement rows (client → coordinator, UPLOAD_COMPLETE)
// ---------------------------------------------------------------------------

/// Encode an `UPLOAD_COMPLETE` placement row.
pub fn encode_placement_row(placement: &ChunkPlacement) -> String {
    let mut row = format!(
        "{} {} {}",
        placement.chunk_id, placement.index, placement.size
    );
    for node_id in &placement.node_ids {
        row.push(' ');
        row.push_str(node_id.as_str());
    }
    row
}

/// Parse an `UPLOAD_COMPLETE` placement row.
///
/// Requires at least one node id; the coordinator skips rows this rejects
/// rather than failing the whole registration read.
pub fn parse_placement_row(line: &str) -> Result<ChunkPlacement, ProtoError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 4 {
        return Err(ProtoError::MalformedRecord(line.to_string()));
    }
    let chunk_id: ChunkId = parse_token(tokens[0], line)?;
    let index: u64 = parse_token(tokens[1], line)?;
    let size: u64 = parse_token(tokens[2], line)?;
    let node_ids = tokens[3..]
        .iter()
        .map(|t| parse_token::<NodeId>(t, line))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ChunkPlacement {
        chunk_id,
        index,
        size,
        node_ids,
    })
}

// ---------------------------------------------------------------------------
// Location rows (coordinator → client, DOWNLOAD_RESPONSE)
// ---------------------------------------------------------------------------

/// One replica entry in a location row. A node the coordinator no longer
/// knows an endpoint for is listed by bare id only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkReplica {
    /// The node claiming to hold the chunk.
    pub node_id: NodeId,
    /// `(ip, port)` when the coordinator still has the node registered.
    pub endpoint: Option<(String, u16)>,
}

/// A chunk's download locations as exchanged in `DOWNLOAD_RESPONSE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkLocations {
    /// Content-addressed chunk identifier.
    pub chunk_id: ChunkId,
    /// Zero-based chunk ordinal.
    pub index: u64,
    /// Payload size in bytes.
    pub size: u64,
    /// Replicas in coordinator order.
    pub replicas: Vec<ChunkReplica>,
}

/// Encode a `DOWNLOAD_RESPONSE` location row.
pub fn encode_location_row(locations: &ChunkLocations) -> String {
    let mut row = format!(
        "{} {} {}",
        locations.chunk_id, locations.index, locations.size
    );
    for replica in &locations.replicas {
        row.push(' ');
        row.push_str(replica.node_id.as_str());
        if let Some((ip, port)) = &replica.endpoint {
            row.push(' ');
            row.push_str(ip);
            row.push(' ');
            row.push_str(&port.to_string());
        }
    }
    row
}

/// Parse a `DOWNLOAD_RESPONSE` location row.
///
/// Replica tokens are consumed greedily as `nodeId ip port` triples; a
/// token group that does not end in a valid port falls back to a bare node
/// id, so rows that mix full and degraded entries still parse.
pub fn parse_location_row(line: &str) -> Result<ChunkLocations, ProtoError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 4 {
        return Err(ProtoError::MalformedRecord(line.to_string()));
    }
    let chunk_id: ChunkId = parse_token(tokens[0], line)?;
    let index: u64 = parse_token(tokens[1], line)?;
    let size: u64 = parse_token(tokens[2], line)?;

    let mut replicas = Vec::new();
    let mut j = 3;
    while j < tokens.len() {
        let node_id: NodeId = parse_token(tokens[j], line)?;
        if j + 2 < tokens.len()
            && let Ok(port) = tokens[j + 2].parse::<u16>()
        {
            replicas.push(ChunkReplica {
                node_id,
                endpoint: Some((tokens[j + 1].to_string(), port)),
            });
            j += 3;
        } else {
            replicas.push(ChunkReplica {
                node_id,
                endpoint: None,
            });
            j += 1;
        }
    }

    Ok(ChunkLocations {
        chunk_id,
        index,
        size,
        replicas,
    })
}

// ---------------------------------------------------------------------------
// File rows
// ---------------------------------------------------------------------------

/// Encode a `LIST_FILES` row.
pub fn encode_file_row(filename: &str, size: u64) -> String {
    format!("{filename} {size}")
}

/// Parse a `LIST_FILES` row. The last token is the size; everything before
/// it is the filename, which may contain spaces.
pub fn parse_file_row(line: &str) -> Result<(String, u64), ProtoError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 2 {
        return Err(ProtoError::MalformedRecord(line.to_string()));
    }
    let size: u64 = parse_token(tokens[tokens.len() - 1], line)?;
    Ok((tokens[..tokens.len() - 1].join(" "), size))
}

fn parse_token<T: std::str::FromStr>(token: &str, line: &str) -> Result<T, ProtoError> {
    token
        .parse()
        .map_err(|_| ProtoError::MalformedRecord(line.to_string()))
}
