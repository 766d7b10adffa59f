use std::path::PathBuf;

use config::{Config, Environment, File};
use secrecy::SecretString;
use serde::Deserialize;

use crate::ConfigError;

/// Default configuration file, relative to the working directory.
pub const CONFIG_FILE: &str = "config/office-chat";

/// Environment prefix; sections are separated by `__`.
pub const ENV_PREFIX: &str = "OFFICE_CHAT";

/// Variable historically used for the suggestion API key.
pub const LEGACY_SUGGESTION_KEY_VAR: &str = "API_KEY";

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub log: LogSettings,
    pub channel: ChannelSettings,
    pub firestore: FirestoreSettings,
    pub suggestions: SuggestionSettings,
}

#[derive(Debug, Deserialize)]
pub struct LogSettings {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins when set.
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Deserialize)]
pub struct ChannelSettings {
    /// Backend used when no valid Firestore credentials are present.
    pub fallback: FallbackBackend,
    /// Message file of the local backend.
    pub local_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackBackend {
    Local,
    Memory,
}

#[derive(Debug, Deserialize)]
pub struct FirestoreSettings {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct SuggestionSettings {
    #[serde(default)]
    pub api_key: Option<SecretString>,
    pub model: String,
    pub base_url: String,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl Settings {
    /// Loads `.env`, then the layered sources.
    pub fn load() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!(error = %e, "ignoring unreadable .env"),
        }

        let builder = Self::defaults(Config::builder())?
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).prefix_separator("__").separator("__"));

        let builder = match std::env::var(LEGACY_SUGGESTION_KEY_VAR) {
            Ok(key) if !key.trim().is_empty() => builder.set_default("suggestions.api_key", key)?,
            _ => builder,
        };

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Loads from an explicit TOML string on top of the defaults; no environment.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        Ok(Self::defaults(Config::builder())?
            .add_source(File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?)
    }

    fn defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Ok(builder
            .set_default("log.level", "info")?
            .set_default("log.format", "pretty")?
            .set_default("channel.fallback", "local")?
            .set_default("channel.local_path", "data/messages.json")?
            .set_default("firestore.base_url", "https://firestore.googleapis.com/v1")?
            .set_default("firestore.poll_interval_ms", 2000_i64)?
            .set_default("suggestions.model", "gemini-2.5-flash")?
            .set_default(
                "suggestions.base_url",
                "https://generativelanguage.googleapis.com/v1beta",
            )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn defaults_fill_every_section() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings.log.level, "info");
        assert_eq!(settings.log.format, LogFormat::Pretty);
        assert_eq!(settings.channel.fallback, FallbackBackend::Local);
        assert_eq!(settings.channel.local_path, PathBuf::from("data/messages.json"));
        assert_eq!(settings.firestore.poll_interval_ms, 2000);
        assert!(settings.firestore.api_key.is_none());
        assert_eq!(settings.suggestions.model, "gemini-2.5-flash");
    }

    #[test]
    fn file_values_override_defaults() {
        let settings = Settings::from_toml(
            r#"
            [log]
            format = "json"

            [channel]
            fallback = "memory"

            [firestore]
            project_id = "workchat-ufficio"
            api_key = "AIza-test"
            "#,
        )
        .unwrap();
        assert_eq!(settings.log.format, LogFormat::Json);
        assert_eq!(settings.channel.fallback, FallbackBackend::Memory);
        assert_eq!(settings.firestore.project_id, "workchat-ufficio");
        assert_eq!(
            settings.firestore.api_key.as_ref().map(|k| k.expose_secret().to_string()),
            Some("AIza-test".to_string())
        );
    }

    #[test]
    fn secrets_are_redacted_in_debug_output() {
        let settings = Settings::from_toml("[suggestions]\napi_key = \"super-secret\"").unwrap();
        assert!(!format!("{settings:?}").contains("super-secret"));
    }
}
