//! Durable store traits
//!
//! The store is a read-optimized mirror plus a delivery queue. It provides
//! its own row-level isolation; nothing here is transactional with the
//! in-memory session state.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::error::StoreError;
use crate::types::{InstanceId, InstanceRecord, MessageId, OutgoingMessage};

/// Persistence for instance status rows
#[async_trait]
pub trait InstanceStore: Send + Sync {
    /// Create-or-update the row keyed by `record.id`
    async fn upsert(&self, record: &InstanceRecord) -> Result<(), StoreError>;

    /// Fetch one row
    async fn get(&self, id: &InstanceId) -> Result<Option<InstanceRecord>, StoreError>;

    /// Remove one row. Removing an absent row is a no-op.
    async fn delete(&self, id: &InstanceId) -> Result<(), StoreError>;

    /// Snapshot of all rows
    async fn list(&self) -> Result<Vec<InstanceRecord>, StoreError>;
}

/// Persistence for the outgoing message queue
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Insert a pending row and notify subscribers
    async fn insert(&self, message: &OutgoingMessage) -> Result<(), StoreError>;

    /// Fetch one row
    async fn get(&self, id: &MessageId) -> Result<Option<OutgoingMessage>, StoreError>;

    /// Conditional pending -> sent. Returns false when the row has
    /// already left pending, so duplicate deliveries are no-ops.
    async fn mark_sent(&self, id: &MessageId, provider_message_id: &str)
        -> Result<bool, StoreError>;

    /// Conditional pending -> failed. Same no-op semantics as `mark_sent`.
    async fn mark_failed(&self, id: &MessageId, reason: &str) -> Result<bool, StoreError>;

    /// Pending rows enqueued at least `age` ago. Poll fallback for
    /// notifications that were lost.
    async fn pending_older_than(&self, age: Duration) -> Result<Vec<OutgoingMessage>, StoreError>;

    /// Push notifications of newly-inserted pending rows. Delivery is
    /// neither exactly-once nor ordered.
    fn subscribe(&self) -> broadcast::Receiver<MessageId>;
}
