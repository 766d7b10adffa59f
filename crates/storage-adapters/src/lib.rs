//! # storage-adapters
//!
//! Delivery channel implementations. The in-memory channel is always built;
//! the local-file and Firestore channels are compiled in by feature.

pub mod listeners;
pub mod memory;

#[cfg(feature = "channel-local")]
pub mod local_file;

#[cfg(feature = "channel-firestore")]
pub mod firestore;

pub use listeners::ListenerRegistry;
pub use memory::{MemoryChannel, MessageLog};

#[cfg(feature = "channel-local")]
pub use local_file::LocalFileChannel;

#[cfg(feature = "channel-firestore")]
pub use firestore::{FirestoreChannel, FirestoreConfig};

use domains::Message;

/// Ascending by timestamp. The sort is stable, so ties keep insertion order.
pub(crate) fn in_timestamp_order(mut messages: Vec<Message>) -> Vec<Message> {
    messages.sort_by_key(|m| m.timestamp);
    messages
}
