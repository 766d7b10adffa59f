//! One-shot choice of the delivery backend, made at process start.

use std::path::PathBuf;

use secrecy::ExposeSecret;

use crate::settings::{FallbackBackend, Settings};

/// Marker left in unconfigured credential templates.
const PLACEHOLDER_MARKERS: &[&str] = &["TUA_API_KEY", "YOUR_API_KEY", "changeme"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendChoice {
    Firestore,
    LocalFile(PathBuf),
    Memory,
}

fn usable(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && !PLACEHOLDER_MARKERS.iter().any(|m| value.contains(m))
}

/// Firestore when both project id and API key are usable, otherwise the
/// configured fallback.
pub fn select_backend(settings: &Settings) -> BackendChoice {
    let firestore = &settings.firestore;
    let has_credentials = usable(&firestore.project_id)
        && firestore
            .api_key
            .as_ref()
            .is_some_and(|key| usable(key.expose_secret()));

    if has_credentials {
        return BackendChoice::Firestore;
    }

    tracing::warn!(
        fallback = ?settings.channel.fallback,
        "Firestore is not configured; messages stay on this machine"
    );
    match settings.channel.fallback {
        FallbackBackend::Local => BackendChoice::LocalFile(settings.channel.local_path.clone()),
        FallbackBackend::Memory => BackendChoice::Memory,
    }
}
