//! TCP accept loop with a hard cap on concurrent workers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::handler::Coordinator;

/// Accept connections until `shutdown` flips, then drain in-flight workers.
///
/// Once `max_clients` workers are in flight, further connections are closed
/// immediately without a reply.
pub async fn serve(
    listener: TcpListener,
    coordinator: Arc<Coordinator>,
    max_clients: usize,
    mut shutdown: watch::Receiver<bool>,
) {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let mut workers = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("listener shutting down");
                break;
            }
            // Reap finished workers so the set does not grow unbounded.
            Some(_) = workers.join_next(), if !workers.is_empty() => {}
            accepted = listener.accept() => {
                let (mut stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(%e, "accept failed");
                        continue;
                    }
                };

                if in_flight.load(Ordering::SeqCst) >= max_clients {
                    warn!(%peer, "client limit reached, rejecting connection");
                    drop(stream);
                    continue;
                }

                in_flight.fetch_add(1, Ordering::SeqCst);
                let coordinator = coordinator.clone();
                let in_flight = in_flight.clone();
                workers.spawn(async move {
                    coordinator
                        .handle_connection(&mut stream, &peer.to_string())
                        .await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                });
            }
        }
    }

    // The listening socket closes with the loop; in-flight workers finish
    // their current request under their own deadlines.
    drop(listener);
    while workers.join_next().await.is_some() {}
    info!("all workers drained");
}
