//! # Local file channel
//!
//! All messages live in one JSON file, rewritten on every submit and
//! read-mark. Two notification paths are wired and both are needed:
//!
//! - an in-process broadcast fired right after each write, so listeners in
//!   the writing process see their own changes immediately;
//! - a filesystem watcher on the file, so other processes sharing the file
//!   see the change too.
//!
//! A snapshot identical to the last one delivered is not delivered again,
//! which also swallows the watcher echo of our own writes.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use domains::{
    Backend, ChannelError, DeliveryChannel, Message, MessageId, SnapshotListener, Subscription,
};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::fs;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::in_timestamp_order;
use crate::listeners::ListenerRegistry;

pub struct LocalFileChannel {
    inner: Arc<Inner>,
    _watcher: RecommendedWatcher,
    pump: JoinHandle<()>,
}

struct Inner {
    path: PathBuf,
    /// Serialises read-modify-write cycles within this process.
    write_lock: tokio::sync::Mutex<()>,
    listeners: ListenerRegistry,
    last_delivered: Mutex<Option<Vec<Message>>>,
}

fn storage_error(context: &str, err: impl std::fmt::Display) -> ChannelError {
    ChannelError::Storage(format!("{context}: {err}"))
}

impl LocalFileChannel {
    /// Opens (or prepares to create) the message file at `path` and starts
    /// watching it. Must be called inside a tokio runtime.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, ChannelError> {
        let path = path.into();
        let file_name = path
            .file_name()
            .ok_or_else(|| ChannelError::Configuration(format!("{} is not a file path", path.display())))?
            .to_os_string();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        // 1. Ensure directory exists
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| storage_error("creating message directory", e))?;

        // 2. Watch the directory; renames replace the file, so watching the file itself would go stale
        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if event.paths.iter().any(|p| p.file_name() == Some(file_name.as_os_str())) {
                    let _ = tx.send(());
                }
            }
            Err(e) => tracing::warn!(error = %e, "message file watcher error"),
        })
        .map_err(|e| storage_error("starting file watcher", e))?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| storage_error("watching message directory", e))?;

        let inner = Arc::new(Inner {
            path,
            write_lock: tokio::sync::Mutex::new(()),
            listeners: ListenerRegistry::new(),
            last_delivered: Mutex::new(None),
        });

        // 3. Forward changes made by other processes
        let pump = tokio::spawn(pump_external_changes(Arc::downgrade(&inner), rx));

        tracing::info!(path = %inner.path.display(), "local file channel ready");
        Ok(Self { inner, _watcher: watcher, pump })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }
}

impl Drop for LocalFileChannel {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

async fn pump_external_changes(inner: Weak<Inner>, mut rx: mpsc::UnboundedReceiver<()>) {
    while rx.recv().await.is_some() {
        // One rename produces several events; reload once per burst.
        while rx.try_recv().is_ok() {}

        let Some(inner) = inner.upgrade() else { break };
        let _guard = inner.write_lock.lock().await;
        match inner.load().await {
            Ok(messages) => inner.deliver(messages),
            Err(e) => tracing::warn!(error = %e, "ignoring unreadable message file change"),
        }
    }
}

impl Inner {
    async fn load(&self) -> Result<Vec<Message>, ChannelError> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(storage_error("reading message file", e)),
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&raw).map_err(|e| storage_error("decoding message file", e))
    }

    /// Write to a sibling temp file, then rename over the original.
    async fn store(&self, messages: &[Message]) -> Result<(), ChannelError> {
        let json = serde_json::to_vec(messages).map_err(|e| storage_error("encoding messages", e))?;
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, json)
            .await
            .map_err(|e| storage_error("writing message file", e))?;
        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| storage_error("replacing message file", e))?;
        Ok(())
    }

    /// Callers hold `write_lock`, so snapshots go out in write order.
    fn deliver(&self, messages: Vec<Message>) {
        let snapshot = in_timestamp_order(messages);
        {
            let mut last = self.last_delivered.lock().unwrap_or_else(|p| p.into_inner());
            if last.as_ref() == Some(&snapshot) {
                return;
            }
            *last = Some(snapshot.clone());
        }
        self.listeners.notify(&snapshot);
    }
}

#[async_trait]
impl DeliveryChannel for LocalFileChannel {
    fn backend(&self) -> Backend {
        Backend::LocalFile
    }

    async fn submit(&self, message: Message) -> Result<(), ChannelError> {
        message.validate()?;

        let _guard = self.inner.write_lock.lock().await;
        let mut messages = self.inner.load().await?;
        if messages.iter().any(|m| m.id == message.id) {
            return Err(ChannelError::DuplicateId(message.id));
        }
        tracing::debug!(id = %message.id, kind = message.kind.as_str(), "local file submit");
        messages.push(message);
        self.inner.store(&messages).await?;
        self.inner.deliver(messages);
        Ok(())
    }

    async fn subscribe(&self, listener: SnapshotListener) -> Result<Subscription, ChannelError> {
        let _guard = self.inner.write_lock.lock().await;
        let snapshot = in_timestamp_order(self.inner.load().await?);
        {
            let mut last = self.inner.last_delivered.lock().unwrap_or_else(|p| p.into_inner());
            if last.is_none() {
                *last = Some(snapshot.clone());
            }
        }
        let subscription = self.inner.listeners.register(listener.clone());
        listener(snapshot);
        Ok(subscription)
    }

    async fn mark_as_read(&self, ids: &[MessageId]) -> Result<(), ChannelError> {
        let wanted: HashSet<&MessageId> = ids.iter().collect();

        let _guard = self.inner.write_lock.lock().await;
        let mut messages = self.inner.load().await?;
        let mut changed = 0usize;
        for message in messages.iter_mut().filter(|m| !m.read && wanted.contains(&m.id)) {
            message.read = true;
            changed += 1;
        }
        if changed == 0 {
            return Ok(());
        }
        tracing::debug!(changed, "local file mark as read");
        self.inner.store(&messages).await?;
        self.inner.deliver(messages);
        Ok(())
    }
}
