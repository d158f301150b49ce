//! `krill-stored` — a Krill storage node.
//!
//! Stores chunk payloads under their SHA-256 ids and serves them back over
//! the chunk-transfer protocol (`STORE_CHUNK`, `GET_CHUNK`, `CHECK_CHUNK`).
//! On startup the node registers with the coordinator; afterwards it pushes
//! a keep-alive and a free-space report on every heartbeat tick.
//!
//! The daemon entrypoint lives in `main.rs`; this library exposes the
//! pieces so integration tests can run storage nodes in-process.

pub mod config;
pub mod heartbeat;
pub mod service;
