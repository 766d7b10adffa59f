//! # Firestore channel
//!
//! Remote backend over the Firestore REST API. Every message is one document
//! in the `messages` collection, keyed by the message id.
//!
//! Subscriptions poll a structured query (ordered by timestamp, capped at the
//! most recent [`SNAPSHOT_LIMIT`] messages) and deliver a snapshot only when
//! the result changed. Local writes trigger an immediate refresh.

mod codec;
mod http;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domains::{
    Backend, ChannelError, DeliveryChannel, Message, MessageId, SnapshotListener, Subscription,
};
use reqwest::{Client, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use self::codec::QueryItem;
use self::http::{classify_status, classify_transport, ensure_success, is_missing_document};
use crate::in_timestamp_order;

pub const COLLECTION: &str = "messages";

/// Visibility bound of the remote backend.
pub const SNAPSHOT_LIMIT: usize = 500;

pub const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/v1";

#[derive(Debug)]
pub struct FirestoreConfig {
    pub project_id: String,
    pub api_key: SecretString,
    pub database: String,
    pub base_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Option<Duration>,
}

impl FirestoreConfig {
    pub fn new(project_id: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            project_id: project_id.into(),
            api_key,
            database: "(default)".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval: Duration::from_secs(2),
            request_timeout: None,
        }
    }
}

pub struct FirestoreChannel {
    shared: Arc<Shared>,
}

struct Shared {
    client: Client,
    api_key: SecretString,
    /// `.../projects/{project}/databases/{database}/documents`
    documents_root: Url,
    poll_interval: Duration,
    /// Bumped after every local write; each poll task watches it.
    refresh: watch::Sender<u64>,
}

impl FirestoreChannel {
    pub fn new(config: FirestoreConfig) -> Result<Self, ChannelError> {
        if config.project_id.trim().is_empty() {
            return Err(ChannelError::Configuration("Firestore project id is empty".into()));
        }

        let root = format!(
            "{}/projects/{}/databases/{}/documents",
            config.base_url.trim_end_matches('/'),
            config.project_id,
            config.database
        );
        let documents_root = Url::parse(&root)
            .map_err(|e| ChannelError::Configuration(format!("invalid Firestore URL {root}: {e}")))?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ChannelError::Configuration(format!("building HTTP client: {e}")))?;

        tracing::info!(project = %config.project_id, database = %config.database, "firestore channel ready");

        Ok(Self {
            shared: Arc::new(Shared {
                client,
                api_key: config.api_key,
                documents_root,
                poll_interval: config.poll_interval,
                refresh: watch::channel(0).0,
            }),
        })
    }
}

impl Shared {
    fn collection_url(&self) -> Result<Url, ChannelError> {
        let mut url = self.documents_root.clone();
        url.path_segments_mut()
            .map_err(|_| ChannelError::Configuration("Firestore URL cannot be a base".into()))?
            .push(COLLECTION);
        Ok(url)
    }

    fn document_url(&self, id: &MessageId) -> Result<Url, ChannelError> {
        let mut url = self.collection_url()?;
        url.path_segments_mut()
            .map_err(|_| ChannelError::Configuration("Firestore URL cannot be a base".into()))?
            .push(id.as_str());
        Ok(url)
    }

    fn run_query_url(&self) -> Result<Url, ChannelError> {
        // The method is appended to the last path segment: `documents:runQuery`.
        let raw = format!("{}:runQuery", self.documents_root.as_str().trim_end_matches('/'));
        Url::parse(&raw).map_err(|e| ChannelError::Configuration(format!("invalid query URL: {e}")))
    }

    fn key(&self) -> [(&'static str, &str); 1] {
        [("key", self.api_key.expose_secret())]
    }

    async fn create(&self, message: &Message) -> Result<(), ChannelError> {
        let response = self
            .client
            .post(self.collection_url()?)
            .query(&[("documentId", message.id.as_str())])
            .query(&self.key())
            .json(&json!({ "fields": codec::encode_fields(message) }))
            .send()
            .await
            .map_err(classify_transport)?;

        if response.status() == StatusCode::CONFLICT {
            return Err(ChannelError::DuplicateId(message.id.clone()));
        }
        ensure_success(response).await?;
        Ok(())
    }

    /// `Ok(false)` when the document does not exist.
    async fn set_read(&self, id: &MessageId) -> Result<bool, ChannelError> {
        let response = self
            .client
            .patch(self.document_url(id)?)
            .query(&[
                ("updateMask.fieldPaths", "read"),
                ("currentDocument.exists", "true"),
            ])
            .query(&self.key())
            .json(&json!({ "fields": { "read": { "booleanValue": true } } }))
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            if is_missing_document(status, &body) {
                return Ok(false);
            }
            return Err(classify_status(status, &body));
        }
        ensure_success(response).await?;
        Ok(true)
    }

    /// Wakes every poll task, including one that is mid-fetch.
    fn nudge(&self) {
        self.refresh.send_modify(|version| *version = version.wrapping_add(1));
    }

    async fn fetch_snapshot(&self) -> Result<Vec<Message>, ChannelError> {
        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": COLLECTION }],
                "orderBy": [{ "field": { "fieldPath": "timestamp" }, "direction": "DESCENDING" }],
                "limit": SNAPSHOT_LIMIT,
            }
        });
        let response = self
            .client
            .post(self.run_query_url()?)
            .query(&self.key())
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?;
        let items: Vec<QueryItem> = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(classify_transport)?;

        let mut messages = Vec::with_capacity(items.len());
        for document in items.into_iter().filter_map(|item| item.document) {
            match codec::decode_document(&document) {
                Ok(message) => messages.push(message),
                Err(e) => tracing::warn!(error = %e, "skipping undecodable document"),
            }
        }
        // Newest-first from the query; flip back to ascending.
        messages.reverse();
        Ok(most_recent(messages, SNAPSHOT_LIMIT))
    }
}

/// Ascending by timestamp, keeping only the newest `limit` messages.
pub(crate) fn most_recent(messages: Vec<Message>, limit: usize) -> Vec<Message> {
    let mut ordered = in_timestamp_order(messages);
    if ordered.len() > limit {
        ordered.drain(..ordered.len() - limit);
    }
    ordered
}

async fn poll(shared: Arc<Shared>, mut refresh: watch::Receiver<u64>, listener: SnapshotListener) {
    let mut ticker = tokio::time::interval(shared.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last: Option<Vec<Message>> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = refresh.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }

        match shared.fetch_snapshot().await {
            Ok(snapshot) => {
                if last.as_ref() != Some(&snapshot) {
                    last = Some(snapshot.clone());
                    listener(snapshot);
                }
            }
            Err(e) if e.is_transient() => {
                tracing::warn!(error = %e, "message sync interrupted, retrying on next poll")
            }
            Err(e) => tracing::error!(error = %e, "message sync failed"),
        }
    }
}

#[async_trait]
impl DeliveryChannel for FirestoreChannel {
    fn backend(&self) -> Backend {
        Backend::Firestore
    }

    async fn submit(&self, message: Message) -> Result<(), ChannelError> {
        message.validate()?;
        self.shared.create(&message).await?;
        tracing::debug!(id = %message.id, kind = message.kind.as_str(), "firestore submit");
        self.shared.nudge();
        Ok(())
    }

    async fn subscribe(&self, listener: SnapshotListener) -> Result<Subscription, ChannelError> {
        let refresh = self.shared.refresh.subscribe();
        let task = tokio::spawn(poll(self.shared.clone(), refresh, listener));
        let abort = task.abort_handle();
        Ok(Subscription::new(move || abort.abort()))
    }

    /// Each id is patched independently; one failure does not stop the rest.
    /// Configuration failures are returned once every id has been tried.
    async fn mark_as_read(&self, ids: &[MessageId]) -> Result<(), ChannelError> {
        let mut first_config_error = None;
        let mut updated = 0usize;

        for id in ids {
            match self.shared.set_read(id).await {
                Ok(true) => updated += 1,
                Ok(false) => tracing::debug!(%id, "mark as read: no such message"),
                Err(e) => {
                    tracing::error!(%id, error = %e, "mark as read failed");
                    if e.is_configuration() && first_config_error.is_none() {
                        first_config_error = Some(e);
                    }
                }
            }
        }

        if updated > 0 {
            self.shared.nudge();
        }
        match first_config_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
