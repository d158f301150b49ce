//! Wire protocol codec for the Krill cluster.
//!
//! Everything on the wire is ASCII text framed by CRLF, except chunk
//! payloads, which follow their announcing line as exactly `size` raw bytes
//! on the same connection. The text reader is deliberately byte-at-a-time:
//! it must never consume past the CRLF, because the very next bytes may be
//! a binary payload that a buffered reader would swallow.
//!
//! The crate splits into three layers: CRLF line and length-bounded
//! payload I/O with per-operation deadlines ([`read_line`],
//! [`read_payload`] and friends), typed parsers for coordinator requests
//! and storage-node commands ([`Request`], [`NodeCommand`]), and the
//! record-row grammar of the multi-record exchanges (`UPLOAD_RESPONSE`,
//! `UPLOAD_COMPLETE`, `DOWNLOAD_RESPONSE`, `LIST_FILES`, `LIST_NODES`).

mod error;
mod record;
mod request;
mod wire;

pub use error::{ErrorCode, ProtoError};
pub use record::{
    ChunkLocations, ChunkReplica, END_CHUNKS, END_FILES, END_NODES, encode_file_row,
    encode_location_row, encode_node_row, encode_node_status_row, encode_placement_row,
    parse_file_row, parse_location_row, parse_node_row, parse_node_status_row,
    parse_placement_row,
};
pub use request::{NodeCommand, Request, response_verb};
pub use wire::{MAX_LINE_LEN, read_line, read_payload, write_line, write_payload, write_text};
