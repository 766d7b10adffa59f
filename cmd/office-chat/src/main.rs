//! # office-chat
//!
//! The entry point that assembles the application: settings, logging, the
//! delivery backend (chosen once, never switched), the reply suggester, and
//! the terminal client.

mod terminal;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use configs::{select_backend, BackendChoice, LogFormat, LogSettings, Settings};
use domains::{DeliveryChannel, ReplySuggester};
use secrecy::{ExposeSecret, SecretString};
use services::ChatService;
use storage_adapters::MemoryChannel;
use suggest_adapters::{DisabledSuggester, GeminiConfig, GeminiSuggester};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "channel-firestore")]
use storage_adapters::{FirestoreChannel, FirestoreConfig};

#[cfg(feature = "channel-local")]
use storage_adapters::LocalFileChannel;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("loading settings")?;
    init_tracing(&settings.log);

    // 1. Delivery channel
    let channel = build_channel(&settings).await?;

    // 2. Reply suggestions
    let suggester = build_suggester(&settings);

    // 3. Hand over to the terminal
    let chat = ChatService::new(channel, suggester);
    tracing::info!(backend = %chat.backend(), "office-chat starting");
    terminal::run(chat).await
}

/// Logs go to stderr; stdout belongs to the conversation.
fn init_tracing(log: &LogSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn build_channel(settings: &Settings) -> anyhow::Result<Arc<dyn DeliveryChannel>> {
    match select_backend(settings) {
        #[cfg(feature = "channel-firestore")]
        BackendChoice::Firestore => {
            let fs = &settings.firestore;
            let key = fs
                .api_key
                .as_ref()
                .context("Firestore selected without an API key")?;
            let mut config = FirestoreConfig::new(
                fs.project_id.clone(),
                SecretString::from(key.expose_secret().to_owned()),
            );
            config.base_url = fs.base_url.clone();
            config.poll_interval = Duration::from_millis(fs.poll_interval_ms);
            config.request_timeout = fs.request_timeout_secs.map(Duration::from_secs);
            Ok(Arc::new(FirestoreChannel::new(config)?))
        }
        #[cfg(feature = "channel-local")]
        BackendChoice::LocalFile(path) => Ok(Arc::new(
            LocalFileChannel::open(&path)
                .await
                .with_context(|| format!("opening {}", path.display()))?,
        )),
        other => {
            tracing::warn!(choice = ?other, "backend not compiled in or not configured; using in-memory channel");
            Ok(Arc::new(MemoryChannel::default()))
        }
    }
}

fn build_suggester(settings: &Settings) -> Arc<dyn ReplySuggester> {
    let s = &settings.suggestions;
    let Some(key) = s.api_key.as_ref().filter(|k| !k.expose_secret().trim().is_empty()) else {
        tracing::info!("no suggestion API key; quick replies disabled");
        return Arc::new(DisabledSuggester);
    };

    let mut config = GeminiConfig::new(SecretString::from(key.expose_secret().to_owned()));
    config.model = s.model.clone();
    config.base_url = s.base_url.clone();
    config.request_timeout = s.request_timeout_secs.map(Duration::from_secs);

    match GeminiSuggester::new(config) {
        Ok(suggester) => Arc::new(suggester),
        Err(e) => {
            tracing::warn!(error = %e, "could not build suggestion client; quick replies disabled");
            Arc::new(DisabledSuggester)
        }
    }
}
