//! Coordinator state for the Krill cluster.
//!
//! Two independent tables, each behind its own coarse mutex:
//!
//! - [`NodeRegistry`] tracks registered storage nodes, their free space and
//!   liveness. A background sweep flips `is_active` on nodes whose last
//!   keep-alive has aged past the node timeout; entries are never evicted
//!   automatically.
//! - [`FileCatalog`] maps sanitized filenames to chunk manifests and
//!   enforces the manifest integrity invariants at registration.
//!
//! All reads copy out under the lock, so callers always observe a single
//! consistent snapshot. There are no cross-table transactions: a manifest
//! may reference nodes the registry no longer knows.

mod catalog;
mod error;
mod registry;

pub use catalog::{FileCatalog, sanitize_filename};
pub use error::MetaError;
pub use registry::NodeRegistry;
