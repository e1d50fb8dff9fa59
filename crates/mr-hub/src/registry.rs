//! Session registry
//!
//! Single source of truth for which instances exist. Each entry pairs the
//! session handle with a transport slot; the slot's async mutex serializes
//! install, teardown, and send for one instance, so at most one live
//! transport ever exists per instance ID.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc, Mutex};

use mr_core::error::RelayError;
use mr_core::traits::{Transport, TransportEvent, TransportFactory};
use mr_core::types::{InstanceId, InstanceRecord, InstanceStatus};

use crate::session::{ControlEvent, SessionHandle, SessionInput, Transition};

/// Capacity of the hub-wide transition broadcast.
///
/// Slow observers (publisher, supervisor) fall behind rather than block
/// session actors; lagged receivers resubscribe from the live edge.
const TRANSITION_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the per-generation transport event channel
const TRANSPORT_EVENT_CHANNEL_CAPACITY: usize = 64;

struct TransportSlot {
    generation: u64,
    transport: Option<Box<dyn Transport>>,
}

/// One registry entry: session handle plus its exclusively-owned transport
pub struct SessionEntry {
    pub handle: Arc<SessionHandle>,
    slot: Mutex<TransportSlot>,
}

impl SessionEntry {
    /// Generation of the currently-installed transport slot
    pub async fn slot_generation(&self) -> u64 {
        self.slot.lock().await.generation
    }
}

/// Concurrency-safe map of instance ID to session entry
pub struct SessionRegistry {
    sessions: DashMap<InstanceId, Arc<SessionEntry>>,
    factory: Arc<dyn TransportFactory>,
    transitions: broadcast::Sender<Transition>,
}

impl SessionRegistry {
    pub fn new(factory: Arc<dyn TransportFactory>) -> Self {
        let (transitions, _) = broadcast::channel(TRANSITION_CHANNEL_CAPACITY);
        Self {
            sessions: DashMap::new(),
            factory,
            transitions,
        }
    }

    /// Subscribe to status transitions of all sessions
    pub fn subscribe(&self) -> broadcast::Receiver<Transition> {
        self.transitions.subscribe()
    }

    /// Allocate a fresh session. Does not start a transport.
    ///
    /// Fails with `AlreadyExists` when the ID is already registered.
    pub fn create(
        &self,
        id: InstanceId,
        name: Option<String>,
    ) -> Result<Arc<SessionEntry>, RelayError> {
        match self.sessions.entry(id.clone()) {
            Entry::Occupied(_) => Err(RelayError::AlreadyExists(id.to_string())),
            Entry::Vacant(vacant) => {
                let handle = SessionHandle::spawn(id.clone(), name, self.transitions.clone());
                let entry = Arc::new(SessionEntry {
                    handle,
                    slot: Mutex::new(TransportSlot {
                        generation: 0,
                        transport: None,
                    }),
                });
                vacant.insert(Arc::clone(&entry));
                tracing::info!("Registered instance {}", id);
                Ok(entry)
            }
        }
    }

    /// Allocate a session and immediately install and start its transport
    pub async fn create_and_start(
        &self,
        id: InstanceId,
        name: Option<String>,
    ) -> Result<Arc<SessionEntry>, RelayError> {
        let entry = self.create(id, name)?;
        self.install_and_start(&entry, None).await?;
        Ok(entry)
    }

    pub fn get(&self, id: &InstanceId) -> Option<Arc<SessionEntry>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Snapshot of all live entries
    pub fn list(&self) -> Vec<Arc<SessionEntry>> {
        self.sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Record snapshots of all live entries
    pub fn list_snapshots(&self) -> Vec<InstanceRecord> {
        self.sessions
            .iter()
            .map(|entry| entry.value().handle.snapshot())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Tear down and delete an entry. Removing an absent ID is a no-op.
    ///
    /// Returns whether an entry was removed. Teardown is best-effort; the
    /// entry is gone from the map either way.
    pub async fn remove(&self, id: &InstanceId) -> bool {
        let Some((_, entry)) = self.sessions.remove(id) else {
            return false;
        };

        // Stop the actor first; its cancellation fans out to any pending
        // supervisor recycle for this instance
        entry
            .handle
            .send_input(SessionInput::Control(ControlEvent::Stop))
            .await;
        // The actor broadcasts its disconnecting transition before it
        // cancels; waiting here keeps the removal notification last
        entry.handle.cancel_token().cancelled().await;

        let mut slot = entry.slot.lock().await;
        if let Some(transport) = slot.transport.take() {
            transport.destroy().await;
        }

        let mut record = entry.handle.snapshot();
        record.status = InstanceStatus::Disconnecting;
        let _ = self.transitions.send(Transition {
            record,
            generation: slot.generation,
            removed: true,
        });

        tracing::info!("Removed instance {}", id);
        true
    }

    /// Replace the entry's transport with a fresh one and start it.
    ///
    /// When `expected_generation` is set, the replacement only proceeds if
    /// the slot still holds that generation; otherwise another caller
    /// already recycled and this is a no-op returning `Ok(false)`.
    pub async fn install_and_start(
        &self,
        entry: &SessionEntry,
        expected_generation: Option<u64>,
    ) -> Result<bool, RelayError> {
        let mut slot = entry.slot.lock().await;

        if let Some(expected) = expected_generation {
            if slot.generation != expected {
                tracing::debug!(
                    "Skipping transport install for {}: generation moved {} -> {}",
                    entry.handle.id,
                    expected,
                    slot.generation
                );
                return Ok(false);
            }
        }

        // The prior handle must be released before its successor exists
        if let Some(old) = slot.transport.take() {
            old.destroy().await;
        }

        let name = entry.handle.snapshot().name;
        let transport = self
            .factory
            .create(&entry.handle.id, name.as_deref())
            .await?;

        slot.generation += 1;
        let generation = slot.generation;

        entry
            .handle
            .send_input(SessionInput::Control(ControlEvent::Started { generation }))
            .await;

        let (event_tx, event_rx) = mpsc::channel(TRANSPORT_EVENT_CHANNEL_CAPACITY);
        spawn_event_forwarder(Arc::clone(&entry.handle), generation, event_rx);

        if let Err(e) = transport.start(event_tx).await {
            transport.destroy().await;
            // Push the session to disconnected so the supervisor picks it up
            entry
                .handle
                .send_input(SessionInput::Transport {
                    generation,
                    event: TransportEvent::Disconnected {
                        reason: e.to_string(),
                    },
                })
                .await;
            return Err(e);
        }

        slot.transport = Some(transport);
        Ok(true)
    }

    /// Deliver one message through an instance's transport.
    ///
    /// Returns the provider-assigned message ID. Serializes with lifecycle
    /// operations on the same instance through the slot mutex.
    pub async fn send(
        &self,
        id: &InstanceId,
        target: &str,
        content: &str,
        media_ref: Option<&str>,
    ) -> Result<String, RelayError> {
        let entry = self
            .get(id)
            .ok_or_else(|| RelayError::NotFound(id.to_string()))?;

        if !entry.handle.status().is_connected() {
            return Err(RelayError::NotConnected(id.to_string()));
        }

        let slot = entry.slot.lock().await;
        let transport = slot
            .transport
            .as_ref()
            .ok_or_else(|| RelayError::NotConnected(id.to_string()))?;
        transport.send(target, content, media_ref).await
    }
}

/// Forward one transport generation's events into the session actor.
///
/// The forwarder tags every event with its generation; the actor discards
/// anything that no longer matches the installed slot. Ends when the
/// transport drops its sender or the actor exits.
fn spawn_event_forwarder(
    handle: Arc<SessionHandle>,
    generation: u64,
    mut event_rx: mpsc::Receiver<TransportEvent>,
) {
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if !handle
                .send_input(SessionInput::Transport { generation, event })
                .await
            {
                break;
            }
        }
    });
}
