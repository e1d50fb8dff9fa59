//! In-memory durable store
//!
//! DashMap-backed rows with a broadcast channel standing in for the real
//! store's push-notification capability. Conditional status writes take
//! the row's map shard lock, so pending -> terminal happens exactly once
//! even under duplicate notification delivery.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;

use mr_core::error::StoreError;
use mr_core::time::current_time_millis;
use mr_core::traits::{InstanceStore, OutboxStore};
use mr_core::types::{InstanceId, InstanceRecord, MessageId, MessageStatus, OutgoingMessage};

/// Capacity of the inserted-row notification channel.
///
/// Push delivery is best-effort; the dispatcher's poll fallback covers
/// anything dropped when no receiver keeps up.
const OUTBOX_NOTIFY_CAPACITY: usize = 256;

/// In-memory implementation of both store traits
pub struct MemoryStore {
    instances: DashMap<InstanceId, InstanceRecord>,
    messages: DashMap<MessageId, OutgoingMessage>,
    notify: broadcast::Sender<MessageId>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (notify, _) = broadcast::channel(OUTBOX_NOTIFY_CAPACITY);
        Self {
            instances: DashMap::new(),
            messages: DashMap::new(),
            notify,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InstanceStore for MemoryStore {
    async fn upsert(&self, record: &InstanceRecord) -> Result<(), StoreError> {
        self.instances.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, id: &InstanceId) -> Result<Option<InstanceRecord>, StoreError> {
        Ok(self.instances.get(id).map(|entry| entry.value().clone()))
    }

    async fn delete(&self, id: &InstanceId) -> Result<(), StoreError> {
        self.instances.remove(id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<InstanceRecord>, StoreError> {
        Ok(self
            .instances
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }
}

#[async_trait]
impl OutboxStore for MemoryStore {
    async fn insert(&self, message: &OutgoingMessage) -> Result<(), StoreError> {
        self.messages.insert(message.id.clone(), message.clone());
        // No receivers is fine; the poll fallback picks the row up
        let _ = self.notify.send(message.id.clone());
        Ok(())
    }

    async fn get(&self, id: &MessageId) -> Result<Option<OutgoingMessage>, StoreError> {
        Ok(self.messages.get(id).map(|entry| entry.value().clone()))
    }

    async fn mark_sent(
        &self,
        id: &MessageId,
        provider_message_id: &str,
    ) -> Result<bool, StoreError> {
        let Some(mut entry) = self.messages.get_mut(id) else {
            return Err(StoreError::RowNotFound(id.to_string()));
        };
        if entry.status != MessageStatus::Pending {
            return Ok(false);
        }
        entry.status = MessageStatus::Sent;
        entry.provider_message_id = Some(provider_message_id.to_string());
        Ok(true)
    }

    async fn mark_failed(&self, id: &MessageId, reason: &str) -> Result<bool, StoreError> {
        let Some(mut entry) = self.messages.get_mut(id) else {
            return Err(StoreError::RowNotFound(id.to_string()));
        };
        if entry.status != MessageStatus::Pending {
            return Ok(false);
        }
        entry.status = MessageStatus::Failed;
        entry.error_reason = Some(reason.to_string());
        Ok(true)
    }

    async fn pending_older_than(&self, age: Duration) -> Result<Vec<OutgoingMessage>, StoreError> {
        let cutoff = current_time_millis().saturating_sub(age.as_millis() as u64);
        Ok(self
            .messages
            .iter()
            .filter(|entry| {
                entry.value().status == MessageStatus::Pending
                    && entry.value().enqueued_at <= cutoff
            })
            .map(|entry| entry.value().clone())
            .collect())
    }

    fn subscribe(&self) -> broadcast::Receiver<MessageId> {
        self.notify.subscribe()
    }
}
