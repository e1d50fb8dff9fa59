//! Simulated chat transport
//!
//! In auto mode a started transport walks itself through pairing and
//! connection on short configured delays, so the full lifecycle can be
//! exercised without a real provider. In manual mode nothing happens until
//! events are injected through the controller handle, which is how tests
//! drive the state machine deterministically.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use dashmap::DashMap;
use rand::Rng;
use tokio::sync::mpsc;

use mr_core::config::SimTransportConfig;
use mr_core::error::RelayError;
use mr_core::traits::{Transport, TransportEvent, TransportFactory};
use mr_core::types::InstanceId;

/// Pairing codes avoid ambiguous characters (0/O, 1/I)
const PAIRING_CODE_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const PAIRING_CODE_LEN: usize = 8;

fn generate_pairing_code() -> String {
    let mut rng = rand::thread_rng();
    (0..PAIRING_CODE_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..PAIRING_CODE_CHARSET.len());
            PAIRING_CODE_CHARSET[idx] as char
        })
        .collect()
}

fn generate_bound_address() -> String {
    let mut rng = rand::thread_rng();
    let digits: String = (0..12).map(|_| rng.gen_range(0..10).to_string()).collect();
    format!("+{}", digits)
}

fn generate_provider_message_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..16)
        .map(|_| {
            let c = rng.gen_range(0..36);
            std::char::from_digit(c, 36).unwrap_or('0')
        })
        .collect();
    format!("sim-{}", suffix)
}

/// One message the simulator accepted for delivery
#[derive(Debug, Clone)]
pub struct SentRecord {
    pub target: String,
    pub content: String,
    pub media_ref: Option<String>,
    pub provider_message_id: String,
}

/// State shared between a transport, its auto-mode task, and its controller
struct SimShared {
    instance_id: InstanceId,
    ready: AtomicBool,
    destroyed: AtomicBool,
    bound_address: RwLock<Option<String>>,
    events: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    sent: Mutex<Vec<SentRecord>>,
}

impl SimShared {
    fn event_sender(&self) -> Option<mpsc::Sender<TransportEvent>> {
        self.events.lock().ok().and_then(|guard| guard.clone())
    }

    async fn emit(&self, event: TransportEvent) -> bool {
        if self.destroyed.load(Ordering::SeqCst) {
            return false;
        }
        match self.event_sender() {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }
}

/// Simulated per-instance transport
pub struct SimTransport {
    shared: Arc<SimShared>,
    config: SimTransportConfig,
}

#[async_trait]
impl Transport for SimTransport {
    async fn start(&self, events: mpsc::Sender<TransportEvent>) -> Result<(), RelayError> {
        if self.shared.destroyed.load(Ordering::SeqCst) {
            return Err(RelayError::TransportFailure(
                "transport already destroyed".to_string(),
            ));
        }

        if let Ok(mut guard) = self.shared.events.lock() {
            *guard = Some(events);
        }

        if self.config.auto_pair {
            let shared = Arc::clone(&self.shared);
            let pairing_delay = self.config.pairing_delay;
            let connect_delay = self.config.connect_delay;
            tokio::spawn(async move {
                tokio::time::sleep(pairing_delay).await;
                let artifact = generate_pairing_code();
                if !shared.emit(TransportEvent::PairingReady { artifact }).await {
                    return;
                }

                tokio::time::sleep(connect_delay).await;
                if !shared.emit(TransportEvent::Authenticated).await {
                    return;
                }

                let address = generate_bound_address();
                if let Ok(mut guard) = shared.bound_address.write() {
                    *guard = Some(address.clone());
                }
                shared.ready.store(true, Ordering::SeqCst);
                shared.emit(TransportEvent::Ready { address }).await;
            });
        }

        tracing::debug!("Simulated transport started for {}", self.shared.instance_id);
        Ok(())
    }

    async fn send(
        &self,
        target: &str,
        content: &str,
        media_ref: Option<&str>,
    ) -> Result<String, RelayError> {
        if self.shared.destroyed.load(Ordering::SeqCst) {
            return Err(RelayError::TransportFailure(
                "transport destroyed".to_string(),
            ));
        }
        if !self.shared.ready.load(Ordering::SeqCst) {
            return Err(RelayError::TransportFailure(
                "transport not ready".to_string(),
            ));
        }

        let provider_message_id = generate_provider_message_id();
        if let Ok(mut sent) = self.shared.sent.lock() {
            sent.push(SentRecord {
                target: target.to_string(),
                content: content.to_string(),
                media_ref: media_ref.map(str::to_string),
                provider_message_id: provider_message_id.clone(),
            });
        }
        Ok(provider_message_id)
    }

    fn is_ready(&self) -> bool {
        self.shared.ready.load(Ordering::SeqCst)
    }

    fn bound_address(&self) -> Option<String> {
        self.shared
            .bound_address
            .read()
            .ok()
            .and_then(|guard| guard.clone())
    }

    async fn destroy(&self) {
        self.shared.destroyed.store(true, Ordering::SeqCst);
        self.shared.ready.store(false, Ordering::SeqCst);
        if let Ok(mut guard) = self.shared.bound_address.write() {
            *guard = None;
        }
        // Dropping the sender ends the event forwarder for this generation
        if let Ok(mut guard) = self.shared.events.lock() {
            guard.take();
        }
        tracing::debug!(
            "Simulated transport destroyed for {}",
            self.shared.instance_id
        );
    }
}

/// Handle for driving one simulated transport from tests
#[derive(Clone)]
pub struct SimController {
    shared: Arc<SimShared>,
}

impl SimController {
    /// Inject a pairing artifact event
    pub async fn emit_pairing(&self, artifact: impl Into<String>) -> bool {
        self.shared
            .emit(TransportEvent::PairingReady {
                artifact: artifact.into(),
            })
            .await
    }

    /// Inject an authenticated event
    pub async fn emit_authenticated(&self) -> bool {
        self.shared.emit(TransportEvent::Authenticated).await
    }

    /// Inject a ready event and mark the transport sendable
    pub async fn emit_ready(&self, address: impl Into<String>) -> bool {
        let address = address.into();
        if let Ok(mut guard) = self.shared.bound_address.write() {
            *guard = Some(address.clone());
        }
        self.shared.ready.store(true, Ordering::SeqCst);
        self.shared.emit(TransportEvent::Ready { address }).await
    }

    /// Inject a disconnect event and mark the transport unsendable
    pub async fn emit_disconnected(&self, reason: impl Into<String>) -> bool {
        self.shared.ready.store(false, Ordering::SeqCst);
        if let Ok(mut guard) = self.shared.bound_address.write() {
            *guard = None;
        }
        self.shared
            .emit(TransportEvent::Disconnected {
                reason: reason.into(),
            })
            .await
    }

    /// Inject an unrecoverable auth failure
    pub async fn emit_auth_failed(&self, reason: impl Into<String>) -> bool {
        self.shared.ready.store(false, Ordering::SeqCst);
        self.shared
            .emit(TransportEvent::AuthFailed {
                reason: reason.into(),
            })
            .await
    }

    /// Whether the transport has been destroyed
    pub fn is_destroyed(&self) -> bool {
        self.shared.destroyed.load(Ordering::SeqCst)
    }

    /// Whether two controllers drive the same underlying transport
    pub fn same_transport(&self, other: &SimController) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Messages the transport accepted for delivery
    pub fn sent_messages(&self) -> Vec<SentRecord> {
        self.shared
            .sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

/// Factory producing simulated transports.
///
/// Keeps the controller for the most recently created transport per
/// instance, so tests can reach the live generation (or a retained handle
/// to a stale one).
pub struct SimTransportFactory {
    config: SimTransportConfig,
    controllers: DashMap<InstanceId, SimController>,
    fail_creates: AtomicBool,
}

impl SimTransportFactory {
    pub fn new(config: SimTransportConfig) -> Self {
        Self {
            config,
            controllers: DashMap::new(),
            fail_creates: AtomicBool::new(false),
        }
    }

    /// Manual-mode factory for tests: no automatic lifecycle progression
    pub fn manual() -> Self {
        Self::new(SimTransportConfig {
            auto_pair: false,
            ..SimTransportConfig::default()
        })
    }

    /// Controller for the most recently created transport of an instance
    pub fn controller(&self, instance_id: &InstanceId) -> Option<SimController> {
        self.controllers
            .get(instance_id)
            .map(|entry| entry.value().clone())
    }

    /// Make subsequent `create` calls fail, for exercising recycle retries
    pub fn set_fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl TransportFactory for SimTransportFactory {
    async fn create(
        &self,
        instance_id: &InstanceId,
        _name: Option<&str>,
    ) -> Result<Box<dyn Transport>, RelayError> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(RelayError::TransportFailure(
                "simulated create failure".to_string(),
            ));
        }

        let shared = Arc::new(SimShared {
            instance_id: instance_id.clone(),
            ready: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            bound_address: RwLock::new(None),
            events: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
        });

        self.controllers.insert(
            instance_id.clone(),
            SimController {
                shared: Arc::clone(&shared),
            },
        );

        Ok(Box::new(SimTransport {
            shared,
            config: self.config.clone(),
        }))
    }
}
