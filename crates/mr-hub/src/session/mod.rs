//! Per-instance session state machine
//!
//! Each managed instance runs one actor task that owns its state. All
//! mutations flow through the actor's input channel: control events from
//! the registry and supervisor, and transport events tagged with the
//! generation of the transport that emitted them. Events from a replaced
//! transport generation are discarded, so a late "ready" from a dead
//! connection can never corrupt the state of its successor.

pub mod supervisor;

use std::sync::{Arc, RwLock};

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use mr_core::traits::TransportEvent;
use mr_core::types::{InstanceId, InstanceRecord, InstanceStatus};

/// Capacity of a session's input channel.
///
/// Holds control and transport events between emitters and the actor.
/// Transports emit a handful of lifecycle events per connection attempt,
/// so a small buffer is enough headroom.
const SESSION_INPUT_CHANNEL_CAPACITY: usize = 64;

/// Input consumed by a session actor
#[derive(Debug)]
pub enum SessionInput {
    /// Lifecycle request from the registry or supervisor
    Control(ControlEvent),
    /// Event emitted by a transport of the given generation
    Transport {
        generation: u64,
        event: TransportEvent,
    },
}

/// Lifecycle requests targeting a session
#[derive(Debug)]
pub enum ControlEvent {
    /// A fresh transport of `generation` was installed and started
    Started { generation: u64 },
    /// The supervisor scheduled a recycle; surfaced as `reconnecting`
    ReconnectScheduled,
    /// Explicit teardown; the actor transitions to `disconnecting` and exits
    Stop,
}

/// One applied status change, broadcast to observers
#[derive(Debug, Clone)]
pub struct Transition {
    /// Snapshot taken immediately after the change
    pub record: InstanceRecord,
    /// Transport generation current at the time of the change
    pub generation: u64,
    /// True for the final notification after the entry is deleted
    pub removed: bool,
}

struct SessionState {
    record: InstanceRecord,
    generation: u64,
}

/// Shared handle to one session.
///
/// Reads go through the snapshot; mutations only happen on the actor task.
pub struct SessionHandle {
    pub id: InstanceId,
    state: RwLock<SessionState>,
    input_tx: mpsc::Sender<SessionInput>,
    cancel: CancellationToken,
}

impl SessionHandle {
    /// Create the handle and spawn its actor task
    pub(crate) fn spawn(
        id: InstanceId,
        name: Option<String>,
        transitions: broadcast::Sender<Transition>,
    ) -> Arc<Self> {
        let (input_tx, input_rx) = mpsc::channel(SESSION_INPUT_CHANNEL_CAPACITY);
        let handle = Arc::new(Self {
            id: id.clone(),
            state: RwLock::new(SessionState {
                record: InstanceRecord::new(id, name),
                generation: 0,
            }),
            input_tx,
            cancel: CancellationToken::new(),
        });

        tokio::spawn(run_session_loop(Arc::clone(&handle), input_rx, transitions));
        handle
    }

    /// Current record snapshot
    pub fn snapshot(&self) -> InstanceRecord {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .record
            .clone()
    }

    /// Current lifecycle status
    pub fn status(&self) -> InstanceStatus {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .record
            .status
    }

    /// Generation of the currently-honored transport
    pub fn generation(&self) -> u64 {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .generation
    }

    /// Cancellation token tied to this session's lifetime
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Queue an input for the actor. Returns false once the actor exited.
    pub async fn send_input(&self, input: SessionInput) -> bool {
        self.input_tx.send(input).await.is_ok()
    }
}

async fn run_session_loop(
    handle: Arc<SessionHandle>,
    mut input_rx: mpsc::Receiver<SessionInput>,
    transitions: broadcast::Sender<Transition>,
) {
    tracing::debug!("Session loop started for {}", handle.id);

    while let Some(input) = input_rx.recv().await {
        let stop = matches!(&input, SessionInput::Control(ControlEvent::Stop));

        let applied = {
            let mut state = handle
                .state
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            apply_input(&mut state, input, &handle.id)
        };

        if let Some(transition) = applied {
            // Receiver lag or absence must never block the hot path
            let _ = transitions.send(transition);
        }

        if stop {
            break;
        }
    }

    handle.cancel.cancel();
    tracing::debug!("Session loop ended for {}", handle.id);
}

fn apply_input(
    state: &mut SessionState,
    input: SessionInput,
    id: &InstanceId,
) -> Option<Transition> {
    match input {
        SessionInput::Control(event) => apply_control_event(state, event, id),
        SessionInput::Transport { generation, event } => {
            if generation != state.generation {
                tracing::debug!(
                    "Discarding stale transport event for {} (generation {} != {}): {:?}",
                    id,
                    generation,
                    state.generation,
                    event
                );
                return None;
            }
            apply_transport_event(&mut state.record, event, id)
                .then(|| snapshot_transition(state))
        }
    }
}

fn apply_control_event(
    state: &mut SessionState,
    event: ControlEvent,
    id: &InstanceId,
) -> Option<Transition> {
    match event {
        ControlEvent::Started { generation } => {
            state.generation = generation;
            set_status(&mut state.record, InstanceStatus::Connecting);
            state.record.pairing_artifact = None;
            state.record.bound_address = None;
            tracing::info!("Instance {} connecting (generation {})", id, generation);
            Some(snapshot_transition(state))
        }
        ControlEvent::ReconnectScheduled => {
            // auth_failed keeps its status through the wait so diagnostics
            // can tell the two recycle causes apart
            if state.record.status != InstanceStatus::Disconnected {
                return None;
            }
            set_status(&mut state.record, InstanceStatus::Reconnecting);
            Some(snapshot_transition(state))
        }
        ControlEvent::Stop => {
            set_status(&mut state.record, InstanceStatus::Disconnecting);
            state.record.pairing_artifact = None;
            state.record.bound_address = None;
            tracing::info!("Instance {} disconnecting", id);
            Some(snapshot_transition(state))
        }
    }
}

/// Apply one transport event to the record. Returns false when the event
/// is illegal in the current status and must be discarded.
fn apply_transport_event(record: &mut InstanceRecord, event: TransportEvent, id: &InstanceId) -> bool {
    match event {
        TransportEvent::PairingReady { artifact } => match record.status {
            InstanceStatus::Connecting | InstanceStatus::AwaitingPairing => {
                // Artifacts are not cumulative; each emission replaces the last
                record.pairing_artifact = Some(artifact);
                set_status(record, InstanceStatus::AwaitingPairing);
                tracing::info!("Instance {} awaiting pairing", id);
                true
            }
            status => discard(id, "pairing_ready", status),
        },
        TransportEvent::Authenticated => {
            // Informational only; the status moves on the ready event
            tracing::debug!("Instance {} authenticated", id);
            false
        }
        TransportEvent::Ready { address } => match record.status {
            InstanceStatus::Connecting | InstanceStatus::AwaitingPairing => {
                record.bound_address = Some(address);
                record.pairing_artifact = None;
                set_status(record, InstanceStatus::Connected);
                tracing::info!(
                    "Instance {} connected as {}",
                    id,
                    record.bound_address.as_deref().unwrap_or("?")
                );
                true
            }
            status => discard(id, "ready", status),
        },
        TransportEvent::Disconnected { reason } => match record.status {
            InstanceStatus::Connected
            | InstanceStatus::Connecting
            | InstanceStatus::AwaitingPairing => {
                record.bound_address = None;
                record.pairing_artifact = None;
                set_status(record, InstanceStatus::Disconnected);
                tracing::warn!("Instance {} disconnected: {}", id, reason);
                true
            }
            status => discard(id, "disconnected", status),
        },
        TransportEvent::AuthFailed { reason } => match record.status {
            InstanceStatus::Connecting | InstanceStatus::AwaitingPairing => {
                record.bound_address = None;
                record.pairing_artifact = None;
                set_status(record, InstanceStatus::AuthFailed);
                tracing::warn!("Instance {} authentication failed: {}", id, reason);
                true
            }
            status => discard(id, "auth_failed", status),
        },
    }
}

fn set_status(record: &mut InstanceRecord, status: InstanceStatus) {
    record.status = status;
    record.last_transition_at = mr_core::time::current_time_millis();
}

fn discard(id: &InstanceId, event: &str, status: InstanceStatus) -> bool {
    tracing::debug!(
        "Discarding out-of-order {} event for {} in status {}",
        event,
        id,
        status
    );
    false
}

fn snapshot_transition(state: &SessionState) -> Transition {
    Transition {
        record: state.record.clone(),
        generation: state.generation,
        removed: false,
    }
}
