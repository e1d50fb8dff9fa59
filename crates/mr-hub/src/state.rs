//! Global hub state

use std::sync::Arc;
use std::time::Instant;

use mr_core::config::HubConfig;
use mr_core::traits::{InstanceStore, OutboxStore, TransportFactory};

use crate::dispatch::OutgoingDispatcher;
use crate::registry::SessionRegistry;
use crate::store::MemoryStore;

/// Global state for the hub daemon
pub struct HubState {
    /// Configuration
    pub config: HubConfig,
    /// Session registry
    pub registry: Arc<SessionRegistry>,
    /// Durable instance mirror
    pub instances: Arc<dyn InstanceStore>,
    /// Durable outgoing queue
    pub outbox: Arc<dyn OutboxStore>,
    /// Outgoing dispatcher
    pub dispatcher: Arc<OutgoingDispatcher>,
    /// Process start time for uptime reporting
    pub started_at: Instant,
}

impl HubState {
    /// Create hub state with the bundled in-memory store
    pub fn new(config: HubConfig, factory: Arc<dyn TransportFactory>) -> Arc<Self> {
        let store = Arc::new(MemoryStore::new());
        Self::with_stores(
            config,
            factory,
            Arc::clone(&store) as Arc<dyn InstanceStore>,
            store as Arc<dyn OutboxStore>,
        )
    }

    /// Create hub state with externally-provided stores
    pub fn with_stores(
        config: HubConfig,
        factory: Arc<dyn TransportFactory>,
        instances: Arc<dyn InstanceStore>,
        outbox: Arc<dyn OutboxStore>,
    ) -> Arc<Self> {
        let registry = Arc::new(SessionRegistry::new(factory));
        let dispatcher = OutgoingDispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&outbox),
            config.dispatch.clone(),
        );

        Arc::new(Self {
            config,
            registry,
            instances,
            outbox,
            dispatcher,
            started_at: Instant::now(),
        })
    }
}
