//! `krill-coordd` — the Krill metadata coordinator.
//!
//! Holds the node registry and the file catalog for its lifetime, services
//! one request per accepted connection, and runs the background liveness
//! sweep. Nothing is persisted: a coordinator restart implies fleet
//! re-registration.
//!
//! The daemon entrypoint lives in `main.rs`; this library exposes the
//! pieces so integration tests can run a coordinator in-process.

pub mod config;
pub mod handler;
pub mod server;
pub mod telemetry;
