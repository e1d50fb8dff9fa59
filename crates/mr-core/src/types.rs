//! Core domain types

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a managed instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub String);

impl InstanceId {
    /// Create a new instance ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a random instance ID
    pub fn generate() -> Self {
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(12)
            .map(char::from)
            .collect::<String>()
            .to_lowercase();
        Self(id)
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for InstanceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for InstanceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for an outgoing message row
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Create a new message ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a random message ID
    pub fn generate() -> Self {
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect();
        Self(id)
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle status of a managed instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    /// Instance exists but its transport has not been started
    Uninitialized,
    /// Transport is opening a connection
    Connecting,
    /// Transport produced a pairing artifact and waits for confirmation
    AwaitingPairing,
    /// Transport is ready and bound to an address
    Connected,
    /// Instance is being torn down on explicit request
    Disconnecting,
    /// Transport dropped; eligible for automatic recycle
    Disconnected,
    /// A recycle is scheduled after a disconnect
    Reconnecting,
    /// Pairing was rejected; observable separately for diagnostics
    AuthFailed,
}

impl InstanceStatus {
    /// Whether the instance can accept sends
    pub fn is_connected(&self) -> bool {
        matches!(self, InstanceStatus::Connected)
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceStatus::Uninitialized => write!(f, "uninitialized"),
            InstanceStatus::Connecting => write!(f, "connecting"),
            InstanceStatus::AwaitingPairing => write!(f, "awaiting_pairing"),
            InstanceStatus::Connected => write!(f, "connected"),
            InstanceStatus::Disconnecting => write!(f, "disconnecting"),
            InstanceStatus::Disconnected => write!(f, "disconnected"),
            InstanceStatus::Reconnecting => write!(f, "reconnecting"),
            InstanceStatus::AuthFailed => write!(f, "auth_failed"),
        }
    }
}

/// Durable row describing one managed instance.
///
/// The in-memory session is authoritative; this row is a read-optimized
/// mirror that may lag briefly behind live state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceRecord {
    /// Stable identifier
    pub id: InstanceId,
    /// Display label
    pub name: Option<String>,
    /// Current lifecycle status
    pub status: InstanceStatus,
    /// Short-lived pairing secret, present only while awaiting pairing
    pub pairing_artifact: Option<String>,
    /// Self-identity assigned by the provider, present only while connected
    pub bound_address: Option<String>,
    /// Unix millis of the most recent status change
    pub last_transition_at: u64,
}

impl InstanceRecord {
    /// Create a fresh record in the uninitialized state
    pub fn new(id: InstanceId, name: Option<String>) -> Self {
        Self {
            id,
            name,
            status: InstanceStatus::Uninitialized,
            pairing_artifact: None,
            bound_address: None,
            last_transition_at: crate::time::current_time_millis(),
        }
    }
}

/// Delivery status of an outgoing message row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Inserted, not yet dispatched
    Pending,
    /// Delivered to the provider
    Sent,
    /// Terminal failure; never retried automatically
    Failed,
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageStatus::Pending => write!(f, "pending"),
            MessageStatus::Sent => write!(f, "sent"),
            MessageStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One row in the durable outgoing queue.
///
/// Once status leaves `Pending` the row is immutable except for
/// observability fields. A producer must insert a new row to retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Row identity
    pub id: MessageId,
    /// Instance that must perform the send
    pub instance_id: InstanceId,
    /// Resolved recipient address
    pub target_address: String,
    /// Text body
    pub content: String,
    /// Optional media reference
    pub media_ref: Option<String>,
    /// Delivery status
    pub status: MessageStatus,
    /// Provider-assigned identifier, set once sent
    pub provider_message_id: Option<String>,
    /// Failure reason, set only on failed
    pub error_reason: Option<String>,
    /// Unix millis at insertion time
    pub enqueued_at: u64,
}

impl OutgoingMessage {
    /// Create a pending row ready for insertion
    pub fn new(
        id: MessageId,
        instance_id: InstanceId,
        target_address: impl Into<String>,
        content: impl Into<String>,
        media_ref: Option<String>,
    ) -> Self {
        Self {
            id,
            instance_id,
            target_address: target_address.into(),
            content: content.into(),
            media_ref,
            status: MessageStatus::Pending,
            provider_message_id: None,
            error_reason: None,
            enqueued_at: crate::time::current_time_millis(),
        }
    }
}
