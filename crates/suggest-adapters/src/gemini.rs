//! Gemini `generateContent` client with a JSON-array response schema.

use std::time::Duration;

use async_trait::async_trait;
use domains::ReplySuggester;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use crate::prompt::{build_prompt, parse_replies};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug)]
pub struct GeminiConfig {
    pub api_key: SecretString,
    pub model: String,
    pub base_url: String,
    pub request_timeout: Option<Duration>,
}

impl GeminiConfig {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            request_timeout: None,
        }
    }
}

pub struct GeminiSuggester {
    client: Client,
    config: GeminiConfig,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateResponse {
    fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .iter()
            .find_map(|p| p.text.as_deref())
    }
}

impl GeminiSuggester {
    pub fn new(config: GeminiConfig) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self { client: builder.build()?, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    async fn request(&self, prompt: String) -> Result<Vec<String>, String> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": { "type": "ARRAY", "items": { "type": "STRING" } }
            }
        });

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.config.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("status {status}"));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| format!("undecodable response: {e}"))?;
        let text = parsed.first_text().ok_or("response has no text")?;
        parse_replies(text).ok_or_else(|| format!("response is not a JSON string array: {text}"))
    }
}

#[async_trait]
impl ReplySuggester for GeminiSuggester {
    async fn generate_replies(
        &self,
        incoming_text: &str,
        sender_name: &str,
        recipient_name: &str,
    ) -> Vec<String> {
        let prompt = build_prompt(incoming_text, sender_name, recipient_name);
        match self.request(prompt).await {
            Ok(replies) => {
                tracing::debug!(count = replies.len(), "quick replies generated");
                replies
            }
            Err(e) => {
                tracing::warn!(error = %e, model = %self.config.model, "quick reply generation failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_text_of_first_candidate() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"[\"Ok\",\"Arrivo\"]"}],"role":"model"}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parse_replies(parsed.first_text().unwrap()).unwrap(), ["Ok", "Arrivo"]);
    }

    #[test]
    fn blocked_responses_have_no_text() {
        let parsed: GenerateResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        assert!(parsed.first_text().is_none());
    }

    #[test]
    fn endpoint_includes_model() {
        let suggester = GeminiSuggester::new(GeminiConfig::new(SecretString::from("k"))).unwrap();
        assert_eq!(
            suggester.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn network_failure_degrades_to_no_suggestions() {
        let mut config = GeminiConfig::new(SecretString::from("k"));
        config.base_url = "http://127.0.0.1:9".to_string();
        let suggester = GeminiSuggester::new(config).unwrap();
        let replies = suggester
            .generate_replies("Puoi venire in ufficio oggi?", "Franco C.", "Giovanni C.")
            .await;
        assert!(replies.is_empty());
    }
}
