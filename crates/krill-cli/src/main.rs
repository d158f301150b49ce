//! `krill` — command-line client for the Krill storage cluster.
//!
//! ```text
//! krill --server 127.0.0.1 --port 8080 upload ./photo.jpg photo.jpg
//! krill --server 127.0.0.1 --port 8080 download photo.jpg ./copy.jpg
//! krill --server 127.0.0.1 --port 8080 list
//! krill --server 127.0.0.1 --port 8080 list --nodes
//! ```
//!
//! Exit code 0 on success, 1 on any failure.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use krill_client::{CoordinatorClient, Downloader, Uploader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "krill", version, about = "Krill distributed storage client")]
struct Cli {
    /// Coordinator IP address.
    #[arg(long)]
    server: IpAddr,

    /// Coordinator port.
    #[arg(long)]
    port: u16,

    /// Verbose output (debug-level logging).
    #[arg(long)]
    verbose: bool,

    /// Suppress progress output.
    #[arg(long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a local file under a remote name.
    Upload {
        /// File to upload.
        local_path: PathBuf,
        /// Name to register in the cluster.
        remote_filename: String,
    },
    /// Download a remote file to a local path.
    Download {
        /// Name of the file in the cluster.
        remote_filename: String,
        /// Where to write the downloaded file.
        local_path: PathBuf,
    },
    /// List files in the cluster.
    List {
        /// Also list storage nodes and their status.
        #[arg(long)]
        nodes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let coordinator = CoordinatorClient::new(SocketAddr::new(cli.server, cli.port));
    let quiet = cli.quiet;

    match cli.command {
        Commands::Upload {
            local_path,
            remote_filename,
        } => {
            if !quiet {
                println!("Uploading {} as {remote_filename}...", local_path.display());
            }
            let mut uploader = Uploader::new(coordinator);
            if !quiet {
                uploader = uploader.with_progress(|done, total| {
                    println!("  chunk {done}/{total} uploaded");
                });
            }
            let summary = uploader
                .upload(&local_path, &remote_filename)
                .await
                .context("upload failed")?;
            println!(
                "Uploaded {remote_filename}: {} chunks, {} bytes",
                summary.chunks, summary.total_size
            );
        }

        Commands::Download {
            remote_filename,
            local_path,
        } => {
            if !quiet {
                println!("Downloading {remote_filename} to {}...", local_path.display());
            }
            let mut downloader = Downloader::new(coordinator);
            if !quiet {
                downloader = downloader.with_progress(|done, total| {
                    println!("  chunk {done}/{total} downloaded");
                });
            }
            let summary = downloader
                .download(&remote_filename, &local_path)
                .await
                .context("download failed")?;
            println!(
                "Downloaded {remote_filename}: {} chunks, {} bytes",
                summary.chunks, summary.total_size
            );
        }

        Commands::List { nodes } => {
            let files = coordinator.list_files().await.context("list failed")?;
            if files.is_empty() {
                println!("No files in the cluster.");
            } else {
                println!("Files ({}):", files.len());
                for (filename, size) in &files {
                    println!("  {filename}  {size} bytes");
                }
            }

            if nodes {
                let listing = coordinator.list_nodes().await.context("node list failed")?;
                println!("Nodes ({}):", listing.len());
                for (endpoint, active) in &listing {
                    println!(
                        "  {}  {}:{}  free={}  {}",
                        endpoint.node_id,
                        endpoint.ip,
                        endpoint.port,
                        endpoint.free_space,
                        if *active { "active" } else { "inactive" }
                    );
                }
            }
        }
    }

    Ok(())
}
