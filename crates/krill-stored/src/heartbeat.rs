//! Keep-alive and free-space push loop.

use std::sync::Arc;
use std::time::Duration;

use krill_client::CoordinatorClient;
use krill_store::ChunkStore;
use krill_types::NodeId;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Push `KEEP_ALIVE` and `UPDATE_SPACE` to the coordinator on every tick
/// until `shutdown` flips. Failed pushes are logged and retried on the next
/// tick; the coordinator marks us inactive if we stay silent too long.
pub async fn run(
    coordinator: CoordinatorClient,
    node_id: NodeId,
    store: Arc<dyn ChunkStore>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = coordinator.keep_alive(&node_id).await {
                    warn!(%node_id, %e, "keep-alive push failed");
                    continue;
                }

                match store.capacity().await {
                    Ok(capacity) => {
                        if let Err(e) = coordinator
                            .update_space(&node_id, capacity.available_bytes)
                            .await
                        {
                            warn!(%node_id, %e, "space update failed");
                        } else {
                            debug!(
                                %node_id,
                                free_space = capacity.available_bytes,
                                "heartbeat pushed"
                            );
                        }
                    }
                    Err(e) => warn!(%node_id, %e, "capacity probe failed"),
                }
            }
            _ = shutdown.changed() => {
                debug!(%node_id, "heartbeat stopping");
                break;
            }
        }
    }
}
