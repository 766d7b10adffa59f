//! In-process listener bookkeeping shared by the channels that notify
//! subscribers themselves.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use domains::{Message, SnapshotListener, Subscription};

#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Arc<DashMap<u64, SnapshotListener>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The returned handle removes the listener when unsubscribed or dropped.
    pub fn register(&self, listener: SnapshotListener) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.insert(id, listener);

        let registry = Arc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(listeners) = registry.upgrade() {
                listeners.remove(&id);
                tracing::debug!(listener = id, "listener removed");
            }
        })
    }

    /// Hands every listener its own copy of the snapshot.
    pub fn notify(&self, snapshot: &[Message]) {
        // Clone out first: a listener may unsubscribe while being called.
        let targets: Vec<SnapshotListener> =
            self.listeners.iter().map(|entry| entry.value().clone()).collect();
        for listener in targets {
            listener(snapshot.to_vec());
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
