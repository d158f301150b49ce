//! Client-side plumbing for the Krill cluster.
//!
//! [`CoordinatorClient`] and the functions in [`node`] speak the wire
//! protocol, one short-lived connection per operation (no connection
//! pooling). On top of them sit the two orchestrators:
//!
//! - [`Uploader`]: split a local file, ask the coordinator for placement
//!   candidates, push every chunk to its replicas in parallel, and report
//!   the final chunk table.
//! - [`Downloader`]: fetch a file's chunk table, pull each chunk from any
//!   replica that serves bytes matching the expected digest, and
//!   reassemble.

mod coordinator;
mod download;
mod error;
pub mod node;
mod progress;
mod upload;

pub use coordinator::{CoordinatorClient, DownloadPlan};
pub use download::{DownloadSummary, Downloader};
pub use error::ClientError;
pub use progress::ProgressFn;
pub use upload::{UploadSummary, Uploader};
