//! Status publisher
//!
//! Mirrors every session transition into the durable instance table so
//! external observers can read current status without touching live
//! objects. The in-memory session is authoritative; this mirror is
//! eventually consistent and a store outage only costs freshness.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use mr_core::traits::InstanceStore;

use crate::registry::SessionRegistry;
use crate::session::Transition;

/// Run the publisher until the hub shuts down.
pub async fn run_status_publisher(
    registry: Arc<SessionRegistry>,
    store: Arc<dyn InstanceStore>,
    shutdown: CancellationToken,
) {
    let mut transitions = registry.subscribe();

    tracing::info!("Starting status publisher");

    loop {
        tokio::select! {
            result = transitions.recv() => match result {
                Ok(transition) => publish(&*store, transition).await,
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!("Status publisher lagged behind {} transitions", missed);
                    resync(&registry, &*store).await;
                }
                Err(RecvError::Closed) => break,
            },
            _ = shutdown.cancelled() => {
                tracing::info!("Status publisher shutting down");
                break;
            }
        }
    }
}

async fn publish(store: &dyn InstanceStore, transition: Transition) {
    let id = transition.record.id.clone();
    let result = if transition.removed {
        store.delete(&id).await
    } else {
        store.upsert(&transition.record).await
    };

    // Never blocks or rolls back the in-memory transition
    if let Err(e) = result {
        tracing::warn!("Failed to publish status for {}: {}", id, e);
    } else {
        tracing::debug!(
            "Published status {} for {}",
            transition.record.status,
            id
        );
    }
}

/// After losing transitions to lag, rewrite every live row from the
/// registry's current snapshots.
async fn resync(registry: &SessionRegistry, store: &dyn InstanceStore) {
    for record in registry.list_snapshots() {
        if let Err(e) = store.upsert(&record).await {
            tracing::warn!("Failed to resync status for {}: {}", record.id, e);
        }
    }
}
