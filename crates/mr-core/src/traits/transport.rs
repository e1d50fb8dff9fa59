//! Transport traits

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::RelayError;
use crate::types::InstanceId;

/// Lifecycle event emitted by a transport.
///
/// Events arrive on the channel handed to [`Transport::start`] and are
/// consumed by the owning session's event loop. A transport may emit
/// `PairingReady` repeatedly; each emission replaces the previous artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A pairing artifact is available for out-of-band confirmation
    PairingReady { artifact: String },
    /// Pairing was confirmed; connection setup continues
    Authenticated,
    /// The transport is ready to send, bound to `address`
    Ready { address: String },
    /// The connection dropped for any reason
    Disconnected { reason: String },
    /// Pairing was rejected; the transport will not recover on its own
    AuthFailed { reason: String },
}

/// Abstraction over one instance's connection to the chat provider
#[async_trait]
pub trait Transport: Send + Sync {
    /// Begin connecting. Lifecycle events are delivered through `events`
    /// until the transport is destroyed. May suspend for seconds while
    /// pairing or authenticating.
    async fn start(&self, events: mpsc::Sender<TransportEvent>) -> Result<(), RelayError>;

    /// Deliver one message to `target`. Returns the provider-assigned
    /// message identifier.
    async fn send(
        &self,
        target: &str,
        content: &str,
        media_ref: Option<&str>,
    ) -> Result<String, RelayError>;

    /// Whether the transport is currently able to send
    fn is_ready(&self) -> bool;

    /// Self-identity assigned by the provider, available once ready
    fn bound_address(&self) -> Option<String>;

    /// Tear down the connection and stop emitting events. Idempotent,
    /// best-effort.
    async fn destroy(&self);
}

/// Constructs fresh transports for the registry and the reconnection path
#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// Build a new, unstarted transport bound to `instance_id`
    async fn create(
        &self,
        instance_id: &InstanceId,
        name: Option<&str>,
    ) -> Result<Box<dyn Transport>, RelayError>;
}
