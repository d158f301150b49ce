//! Daemon entrypoint for a Krill storage node.
//!
//! ```text
//! krill-stored --coordinator 127.0.0.1:8080
//! krill-stored --coordinator 10.0.0.1:8080 --listen-addr 0.0.0.0:9001 \
//!     --data-dir /var/lib/krill --capacity-bytes 53687091200
//! krill-stored --coordinator 127.0.0.1:8080 --memory
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use krill_client::CoordinatorClient;
use krill_store::{ChunkStore, FileStore, MemoryStore};
use krill_stored::config::StoredConfig;
use krill_stored::{heartbeat, service};
use krill_types::KEEP_ALIVE_INTERVAL;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "krill-stored", version, about = "Krill storage node daemon")]
struct Cli {
    /// Coordinator address (`host:port`).
    #[arg(long)]
    coordinator: Option<String>,

    /// Path to a TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind the chunk listener on (port 0 picks a free port).
    #[arg(long)]
    listen_addr: Option<String>,

    /// IPv4 address advertised to the coordinator.
    #[arg(long)]
    advertise_ip: Option<String>,

    /// Directory for chunk files.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Byte budget for stored chunks.
    #[arg(long)]
    capacity_bytes: Option<u64>,

    /// Run fully in memory (no disk persistence).
    #[arg(short, long)]
    memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = StoredConfig::load(cli.config.as_deref()).context("failed to load config")?;

    if let Some(addr) = cli.coordinator {
        config.coordinator.addr = addr;
    }
    if let Some(addr) = cli.listen_addr {
        config.node.listen_addr = addr;
    }
    if let Some(ip) = cli.advertise_ip {
        config.node.advertise_ip = ip;
    }
    if let Some(dir) = cli.data_dir {
        config.node.data_dir = dir;
    }
    if let Some(capacity) = cli.capacity_bytes {
        config.storage.capacity_bytes = capacity;
    }
    if cli.memory {
        config.storage.backend = "memory".to_string();
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log.level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // --- Chunk store ---
    let store: Arc<dyn ChunkStore> = match config.storage.backend.as_str() {
        "memory" => {
            info!("using in-memory chunk store");
            Arc::new(MemoryStore::new(config.storage.capacity_bytes))
        }
        _ => {
            info!(
                dir = %config.node.data_dir.display(),
                capacity = config.storage.capacity_bytes,
                "using file chunk store"
            );
            Arc::new(
                FileStore::open(&config.node.data_dir, config.storage.capacity_bytes)
                    .context("failed to open chunk store")?,
            )
        }
    };

    // --- Chunk listener ---
    let listener = TcpListener::bind(&config.node.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.node.listen_addr))?;
    let port = listener.local_addr()?.port();
    info!(addr = %config.node.listen_addr, port, "chunk listener bound");

    // --- Register with the coordinator ---
    let coordinator_addr = config
        .coordinator
        .addr
        .parse()
        .context("invalid coordinator address")?;
    let coordinator = CoordinatorClient::new(coordinator_addr);
    let free_space = store
        .capacity()
        .await
        .map_err(|e| anyhow::anyhow!("capacity probe failed: {e}"))?
        .available_bytes;
    let node_id = coordinator
        .register_node(&config.node.advertise_ip, port, free_space)
        .await
        .context("failed to register with coordinator")?;
    info!(%node_id, coordinator = %config.coordinator.addr, "registered with coordinator");

    // --- Background heartbeat ---
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    {
        let coordinator = coordinator.clone();
        let node_id = node_id.clone();
        let store = store.clone();
        let shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            heartbeat::run(coordinator, node_id, store, KEEP_ALIVE_INTERVAL, shutdown_rx).await;
        });
    }

    // --- Serve until signalled ---
    let serve_task = tokio::spawn(service::serve_chunks(listener, store, shutdown_rx));
    shutdown_signal().await;
    shutdown_tx.send(true).ok();
    serve_task.await.context("chunk service failed")?;

    info!("shutdown complete");
    Ok(())
}

/// Wait for SIGINT (Ctrl-C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT, initiating graceful shutdown"),
        () = terminate => info!("received SIGTERM, initiating graceful shutdown"),
    }
}
