//! # In-memory channel
//!
//! Single-process mock backend. The message log is an explicit container
//! handed to the channel, so two channels can share one log in tests and
//! nothing lives in process-wide state.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use domains::{
    Backend, ChannelError, DeliveryChannel, Message, MessageId, SnapshotListener, Subscription,
};
use tokio::sync::RwLock;

use crate::in_timestamp_order;
use crate::listeners::ListenerRegistry;

/// Owned, append-only message store.
#[derive(Debug, Default)]
pub struct MessageLog {
    messages: RwLock<Vec<Message>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_messages(messages: Vec<Message>) -> Self {
        Self { messages: RwLock::new(messages) }
    }

    pub async fn snapshot(&self) -> Vec<Message> {
        in_timestamp_order(self.messages.read().await.clone())
    }

    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}

pub struct MemoryChannel {
    log: Arc<MessageLog>,
    listeners: ListenerRegistry,
}

impl MemoryChannel {
    pub fn new(log: Arc<MessageLog>) -> Self {
        Self { log, listeners: ListenerRegistry::new() }
    }

    pub fn log(&self) -> &Arc<MessageLog> {
        &self.log
    }
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new(Arc::new(MessageLog::new()))
    }
}

#[async_trait]
impl DeliveryChannel for MemoryChannel {
    fn backend(&self) -> Backend {
        Backend::Memory
    }

    async fn submit(&self, message: Message) -> Result<(), ChannelError> {
        message.validate()?;

        // Listeners are notified under the write lock so snapshots go out in write order.
        let mut messages = self.log.messages.write().await;
        if messages.iter().any(|m| m.id == message.id) {
            return Err(ChannelError::DuplicateId(message.id));
        }
        tracing::debug!(id = %message.id, kind = message.kind.as_str(), "memory submit");
        messages.push(message);
        self.listeners.notify(&in_timestamp_order(messages.clone()));
        Ok(())
    }

    async fn subscribe(&self, listener: SnapshotListener) -> Result<Subscription, ChannelError> {
        // Holding the read lock keeps writers out until the initial snapshot is out.
        let messages = self.log.messages.read().await;
        let subscription = self.listeners.register(listener.clone());
        listener(in_timestamp_order(messages.clone()));
        Ok(subscription)
    }

    async fn mark_as_read(&self, ids: &[MessageId]) -> Result<(), ChannelError> {
        let wanted: HashSet<&MessageId> = ids.iter().collect();

        let mut messages = self.log.messages.write().await;
        let mut changed = 0usize;
        for message in messages.iter_mut().filter(|m| !m.read && wanted.contains(&m.id)) {
            message.read = true;
            changed += 1;
        }
        if changed == 0 {
            return Ok(());
        }
        tracing::debug!(changed, "memory mark as read");
        self.listeners.notify(&in_timestamp_order(messages.clone()));
        Ok(())
    }
}
