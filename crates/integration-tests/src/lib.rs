//! Shared fixtures for the integration suites.

#[cfg(feature = "channel-firestore")]
pub mod firestore_stub;

use std::time::Duration;

use domains::{find_user, Message, SnapshotListener, User};
use tokio::sync::mpsc;

/// How long a suite waits for a snapshot before failing.
pub const WAIT: Duration = Duration::from_secs(5);

pub fn franco() -> &'static User {
    find_user("1").expect("roster has Franco")
}

pub fn giovanni() -> &'static User {
    find_user("2").expect("roster has Giovanni")
}

pub fn gennaro() -> &'static User {
    find_user("3").expect("roster has Gennaro")
}

/// Listener that forwards every snapshot into a channel.
pub struct Recorder {
    rx: mpsc::UnboundedReceiver<Vec<Message>>,
}

impl Recorder {
    pub fn pair() -> (SnapshotListener, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener: SnapshotListener = std::sync::Arc::new(move |snapshot| {
            let _ = tx.send(snapshot);
        });
        (listener, Self { rx })
    }

    /// Next snapshot, or `None` if nothing arrives within `within`.
    pub async fn next_within(&mut self, within: Duration) -> Option<Vec<Message>> {
        tokio::time::timeout(within, self.rx.recv()).await.ok().flatten()
    }

    /// Waits for the first snapshot satisfying `pred`, skipping the others.
    pub async fn until(&mut self, pred: impl Fn(&[Message]) -> bool) -> Vec<Message> {
        let deadline = tokio::time::Instant::now() + WAIT;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match self.next_within(remaining).await {
                Some(snapshot) if pred(&snapshot) => return snapshot,
                Some(_) => continue,
                None => panic!("no matching snapshot within {WAIT:?}"),
            }
        }
    }

    /// Drains whatever is already queued and returns how many snapshots that was.
    pub fn drain(&mut self) -> usize {
        let mut n = 0;
        while self.rx.try_recv().is_ok() {
            n += 1;
        }
        n
    }
}
