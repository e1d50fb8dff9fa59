//! Outgoing message dispatcher
//!
//! Drains the durable outbox through whatever instances are currently
//! connected. Rows arrive by push notification, by the interval poll that
//! covers lost notifications, or directly from the send API. Every path
//! funnels into the same processing step, whose terminal status write is
//! conditional on the row still being pending, so duplicate deliveries
//! are no-ops. Rows are never retried automatically; a producer must
//! insert a new row to retry.
//!
//! Rows for different instances dispatch concurrently. Rows for the same
//! instance carry no ordering guarantee relative to each other.

use std::sync::Arc;

use dashmap::DashSet;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use mr_core::config::DispatchConfig;
use mr_core::error::{RelayError, StoreError};
use mr_core::traits::OutboxStore;
use mr_core::types::{MessageId, MessageStatus, OutgoingMessage};

use crate::registry::SessionRegistry;

/// Terminal reasons with exact wording observable in the message rows
pub const REASON_INSTANCE_NOT_FOUND: &str = "instance not found";
pub const REASON_INSTANCE_NOT_CONNECTED: &str = "instance not connected";

/// Result of one dispatch attempt for one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Row transitioned pending -> sent
    Sent { provider_message_id: String },
    /// Row transitioned pending -> failed
    Failed { reason: String },
    /// Row had already left pending; nothing was sent
    AlreadyDone,
    /// Another worker in this process holds the row
    InFlight,
}

/// Consumes the outbox and invokes transports through the registry
pub struct OutgoingDispatcher {
    registry: Arc<SessionRegistry>,
    outbox: Arc<dyn OutboxStore>,
    config: DispatchConfig,
    in_flight: DashSet<MessageId>,
}

impl OutgoingDispatcher {
    pub fn new(
        registry: Arc<SessionRegistry>,
        outbox: Arc<dyn OutboxStore>,
        config: DispatchConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            outbox,
            config,
            in_flight: DashSet::new(),
        })
    }

    /// Run the dispatcher until the hub shuts down.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut notifications = self.outbox.subscribe();
        let mut poll = tokio::time::interval(self.config.poll_interval);

        tracing::info!(
            "Starting outgoing dispatcher (poll interval: {:?}, age threshold: {:?})",
            self.config.poll_interval,
            self.config.pending_age_threshold
        );

        loop {
            tokio::select! {
                result = notifications.recv() => match result {
                    Ok(id) => {
                        let dispatcher = Arc::clone(&self);
                        tokio::spawn(async move {
                            dispatcher.dispatch_by_id(&id).await;
                        });
                    }
                    Err(RecvError::Lagged(missed)) => {
                        // The poll fallback will sweep anything missed
                        tracing::warn!("Dispatcher lagged behind {} notifications", missed);
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = poll.tick() => self.poll_pending().await,
                _ = shutdown.cancelled() => {
                    tracing::info!("Outgoing dispatcher shutting down");
                    break;
                }
            }
        }
    }

    /// Insert a fresh row and dispatch it immediately.
    ///
    /// The row is claimed before insertion so the concurrent notification
    /// consumer cannot race this direct path; the caller gets the terminal
    /// outcome for its own row.
    pub async fn send_now(&self, row: OutgoingMessage) -> Result<DispatchOutcome, StoreError> {
        if !self.in_flight.insert(row.id.clone()) {
            return Ok(DispatchOutcome::InFlight);
        }
        let id = row.id.clone();
        let result = self.outbox.insert(&row).await;
        let outcome = match result {
            Ok(()) => Ok(self.process(row).await),
            Err(e) => Err(e),
        };
        self.in_flight.remove(&id);
        outcome
    }

    /// Fetch and dispatch one notified row
    pub async fn dispatch_by_id(&self, id: &MessageId) -> DispatchOutcome {
        if !self.in_flight.insert(id.clone()) {
            return DispatchOutcome::InFlight;
        }

        let outcome = match self.outbox.get(id).await {
            Ok(Some(row)) => self.process(row).await,
            Ok(None) => {
                tracing::warn!("Notified about unknown outbox row {}", id);
                DispatchOutcome::AlreadyDone
            }
            Err(e) => {
                tracing::warn!("Failed to fetch outbox row {}: {}", id, e);
                DispatchOutcome::AlreadyDone
            }
        };

        self.in_flight.remove(id);
        outcome
    }

    /// Dispatch one claimed row. Assumes the caller holds the in-flight
    /// claim for `row.id`.
    async fn process(&self, row: OutgoingMessage) -> DispatchOutcome {
        if row.status != MessageStatus::Pending {
            return DispatchOutcome::AlreadyDone;
        }

        let Some(entry) = self.registry.get(&row.instance_id) else {
            return self.finish_failed(&row, REASON_INSTANCE_NOT_FOUND).await;
        };
        if !entry.handle.status().is_connected() {
            return self
                .finish_failed(&row, REASON_INSTANCE_NOT_CONNECTED)
                .await;
        }

        let target = match resolve_target(&row) {
            Ok(target) => target,
            Err(e) => return self.finish_failed(&row, &e.to_string()).await,
        };

        match self
            .registry
            .send(&row.instance_id, &target, &row.content, row.media_ref.as_deref())
            .await
        {
            Ok(provider_message_id) => {
                match self.outbox.mark_sent(&row.id, &provider_message_id).await {
                    Ok(true) => {
                        tracing::info!(
                            "Dispatched message {} via {} as {}",
                            row.id,
                            row.instance_id,
                            provider_message_id
                        );
                        DispatchOutcome::Sent {
                            provider_message_id,
                        }
                    }
                    Ok(false) => DispatchOutcome::AlreadyDone,
                    Err(e) => {
                        tracing::warn!("Failed to mark message {} sent: {}", row.id, e);
                        DispatchOutcome::Sent {
                            provider_message_id,
                        }
                    }
                }
            }
            Err(e) => {
                // Preserve the transport's message verbatim for diagnostics
                let reason = match e {
                    RelayError::NotFound(_) => REASON_INSTANCE_NOT_FOUND.to_string(),
                    RelayError::NotConnected(_) => REASON_INSTANCE_NOT_CONNECTED.to_string(),
                    other => other.to_string(),
                };
                self.finish_failed(&row, &reason).await
            }
        }
    }

    async fn finish_failed(&self, row: &OutgoingMessage, reason: &str) -> DispatchOutcome {
        match self.outbox.mark_failed(&row.id, reason).await {
            Ok(true) => {
                tracing::warn!("Message {} failed: {}", row.id, reason);
                DispatchOutcome::Failed {
                    reason: reason.to_string(),
                }
            }
            Ok(false) => DispatchOutcome::AlreadyDone,
            Err(e) => {
                tracing::warn!("Failed to mark message {} failed: {}", row.id, e);
                DispatchOutcome::Failed {
                    reason: reason.to_string(),
                }
            }
        }
    }

    async fn poll_pending(self: &Arc<Self>) {
        match self
            .outbox
            .pending_older_than(self.config.pending_age_threshold)
            .await
        {
            Ok(rows) => {
                if !rows.is_empty() {
                    tracing::info!("Poll found {} stale pending messages", rows.len());
                }
                for row in rows {
                    let dispatcher = Arc::clone(self);
                    tokio::spawn(async move {
                        dispatcher.dispatch_by_id(&row.id).await;
                    });
                }
            }
            Err(e) => tracing::warn!("Pending poll failed: {}", e),
        }
    }
}

/// Resolve the recipient address for a row.
///
/// Target resolution through the conversation collaborator happens
/// upstream; rows arrive with the address materialized, so this only
/// rejects rows that slipped in without one.
fn resolve_target(row: &OutgoingMessage) -> Result<String, RelayError> {
    let target = row.target_address.trim();
    if target.is_empty() {
        return Err(RelayError::InvalidRequest(
            "target address is empty".to_string(),
        ));
    }
    Ok(target.to_string())
}
