//! Reconnection supervisor
//!
//! Watches every session's transitions and recycles the transport of any
//! session that lands in `disconnected` or `auth_failed`. The recycle waits
//! a fixed configured delay, then replaces the dead transport with a fresh
//! generation and starts it. There is no backoff growth and no attempt
//! cap; an explicit `stop()` is the only way to end the cycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use mr_core::types::InstanceStatus;

use crate::registry::SessionRegistry;
use crate::session::{ControlEvent, SessionInput, Transition};

/// Run the supervisor until the hub shuts down.
///
/// One recycle task is spawned per qualifying transition; the generation
/// observed at scheduling time guards against double recycles when the
/// broadcast redelivers or another path already replaced the transport.
pub async fn run_supervisor(
    registry: Arc<SessionRegistry>,
    reconnect_delay: Duration,
    shutdown: CancellationToken,
) {
    let mut transitions = registry.subscribe();

    tracing::info!(
        "Starting reconnection supervisor (fixed delay: {:?})",
        reconnect_delay
    );

    loop {
        tokio::select! {
            result = transitions.recv() => match result {
                Ok(transition) => {
                    if should_recycle(&transition) {
                        spawn_recycle(
                            Arc::clone(&registry),
                            transition,
                            reconnect_delay,
                            shutdown.clone(),
                        );
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!("Supervisor lagged behind {} transitions", missed);
                }
                Err(RecvError::Closed) => break,
            },
            _ = shutdown.cancelled() => {
                tracing::info!("Reconnection supervisor shutting down");
                break;
            }
        }
    }
}

fn should_recycle(transition: &Transition) -> bool {
    !transition.removed
        && matches!(
            transition.record.status,
            InstanceStatus::Disconnected | InstanceStatus::AuthFailed
        )
}

fn spawn_recycle(
    registry: Arc<SessionRegistry>,
    transition: Transition,
    delay: Duration,
    shutdown: CancellationToken,
) {
    let id = transition.record.id.clone();
    let scheduled_generation = transition.generation;

    let Some(entry) = registry.get(&id) else {
        return;
    };
    let session_cancel = entry.handle.cancel_token().clone();

    tokio::spawn(async move {
        tracing::info!(
            "Scheduling reconnect for {} in {:?} (generation {})",
            id,
            delay,
            scheduled_generation
        );

        if transition.record.status == InstanceStatus::Disconnected {
            entry
                .handle
                .send_input(SessionInput::Control(ControlEvent::ReconnectScheduled))
                .await;
        }

        loop {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = session_cancel.cancelled() => {
                    tracing::debug!("Reconnect for {} cancelled by stop()", id);
                    return;
                }
                _ = shutdown.cancelled() => return,
            }

            if registry.get(&id).is_none() {
                return;
            }

            match registry
                .install_and_start(&entry, Some(scheduled_generation))
                .await
            {
                Ok(true) => {
                    tracing::info!("Reconnected {} with a fresh transport", id);
                    return;
                }
                Ok(false) => {
                    // Another path already replaced the transport
                    return;
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to recreate transport for {}: {}. Retrying in {:?}",
                        id,
                        e,
                        delay
                    );
                    // Retry on the same fixed delay, never escalate
                }
            }
        }
    });
}
