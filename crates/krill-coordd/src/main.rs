//! Daemon entrypoint for the Krill metadata coordinator.
//!
//! ```text
//! krill-coordd                 # listen on 0.0.0.0:8080
//! krill-coordd 9000            # listen on port 9000
//! krill-coordd -c coord.toml   # load settings from TOML, CLI overrides
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use krill_coordd::config::CoordConfig;
use krill_coordd::handler::Coordinator;
use krill_coordd::{server, telemetry};
use krill_meta::{FileCatalog, NodeRegistry};
use krill_types::KEEP_ALIVE_INTERVAL;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser)]
#[command(name = "krill-coordd", version, about = "Krill metadata coordinator daemon")]
struct Cli {
    /// Listen port (overrides the config file).
    port: Option<u16>,

    /// Path to a TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind (overrides the config file).
    #[arg(long)]
    listen_addr: Option<String>,

    /// Maximum concurrent client connections.
    #[arg(long)]
    max_clients: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = CoordConfig::load(cli.config.as_deref()).context("failed to load config")?;

    if let Some(port) = cli.port {
        config.node.port = port;
    }
    if let Some(addr) = cli.listen_addr {
        config.node.listen_addr = addr;
    }
    if let Some(max_clients) = cli.max_clients {
        config.limits.max_clients = max_clients;
    }

    telemetry::init(&config.log.level);

    let registry = Arc::new(NodeRegistry::new());
    let catalog = Arc::new(FileCatalog::new());
    let coordinator = Arc::new(Coordinator::new(registry.clone(), catalog.clone()));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    // Background liveness sweep.
    {
        let registry = registry.clone();
        let shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            registry.run_sweeper(shutdown_rx).await;
        });
    }

    // Periodic status line.
    {
        let registry = registry.clone();
        let catalog = catalog.clone();
        let mut shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(KEEP_ALIVE_INTERVAL);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        info!(
                            nodes = registry.len(),
                            active = registry.active_count(),
                            files = catalog.len(),
                            free_space = registry.total_free_space(),
                            "cluster status"
                        );
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
        });
    }

    let bind_addr = config.bind_addr();
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!(addr = %bind_addr, max_clients = config.limits.max_clients, "coordinator listening");

    let server_task = tokio::spawn(server::serve(
        listener,
        coordinator,
        config.limits.max_clients,
        shutdown_rx,
    ));

    shutdown_signal().await;
    shutdown_tx.send(true).ok();
    server_task.await.context("server task failed")?;

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
