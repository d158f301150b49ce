//! Error types for coordinator state operations.

use krill_types::NodeId;

/// Errors returned by the node registry and the file catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetaError {
    /// The registry is at its configured node cap.
    #[error("node registry is full ({max} nodes)")]
    RegistryFull {
        /// The cap that was hit.
        max: usize,
    },

    /// The advertised endpoint failed validation.
    #[error("invalid node endpoint {ip}:{port}")]
    InvalidEndpoint {
        /// Advertised address.
        ip: String,
        /// Advertised port.
        port: u16,
    },

    /// The referenced node is not registered.
    #[error("unknown node {0}")]
    NodeNotFound(NodeId),

    /// Manifest validation rejected a registration.
    #[error("invalid file manifest: {0}")]
    InvalidManifest(String),

    /// The filename was empty after sanitization.
    #[error("filename is empty after sanitization")]
    EmptyFilename,
}
