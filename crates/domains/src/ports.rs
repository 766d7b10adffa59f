//! # Core Traits (Ports)
//!
//! Any backend must implement these traits to be used by the binary.
//! Exactly one [`DeliveryChannel`] is chosen at startup and kept for the
//! whole session.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::ChannelError;
use crate::models::{Message, MessageId};

/// Receives the entire message set, ascending by timestamp, on every change.
pub type SnapshotListener = Arc<dyn Fn(Vec<Message>) + Send + Sync>;

/// Unsubscribe handle returned by [`DeliveryChannel::subscribe`].
///
/// Calling [`Subscription::unsubscribe`] or dropping the handle stops further
/// callbacks and releases whatever the channel holds for the listener.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self { cancel: Some(Box::new(cancel)) }
    }

    /// A handle with nothing to release.
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Which implementation backs the running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Firestore,
    LocalFile,
    Memory,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Firestore => "firestore",
            Self::LocalFile => "local-file",
            Self::Memory => "memory",
        })
    }
}

/// Message delivery and read-state synchronisation.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    fn backend(&self) -> Backend;

    /// Appends a fully populated message (id and timestamp already set).
    async fn submit(&self, message: Message) -> Result<(), ChannelError>;

    /// Registers a listener; it receives an initial snapshot and one per change.
    async fn subscribe(&self, listener: SnapshotListener) -> Result<Subscription, ChannelError>;

    /// Sets `read` on every matching message. Unknown or already-read ids are no-ops.
    /// Not atomic across the set.
    async fn mark_as_read(&self, ids: &[MessageId]) -> Result<(), ChannelError>;
}

/// Quick-reply generation. Never fails: any problem yields an empty list.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ReplySuggester: Send + Sync {
    async fn generate_replies(
        &self,
        incoming_text: &str,
        sender_name: &str,
        recipient_name: &str,
    ) -> Vec<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn dropping_a_subscription_cancels_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let sub = Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        drop(sub);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn explicit_unsubscribe_does_not_cancel_twice() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unsubscribe();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn noop_subscription_is_inert() {
        let sub = Subscription::noop();
        assert_eq!(format!("{sub:?}"), "Subscription { active: false }");
        sub.unsubscribe();
    }
}
