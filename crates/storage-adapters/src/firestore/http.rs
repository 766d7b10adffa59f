//! Classification of Firestore HTTP failures into the channel error taxonomy.

use domains::ChannelError;
use reqwest::{Response, StatusCode};
use serde::Deserialize;

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

fn summary(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) if !envelope.error.message.is_empty() => {
            format!("{} {}", envelope.error.status, envelope.error.message).trim().to_string()
        }
        _ => body.chars().take(200).collect(),
    }
}

pub(crate) fn classify_status(status: StatusCode, body: &str) -> ChannelError {
    let detail = summary(body);
    match status.as_u16() {
        401 | 403 => ChannelError::Configuration(format!(
            "Firestore denied access ({status}): {detail}. Check the API key and the security rules"
        )),
        400 if body.contains("API_KEY_INVALID") || body.contains("API key not valid") => {
            ChannelError::Configuration(format!("Firestore rejected the API key: {detail}"))
        }
        404 => ChannelError::Configuration(format!(
            "Firestore project or database not found: {detail}"
        )),
        408 | 429 | 500..=599 => {
            ChannelError::Transient(format!("Firestore unavailable ({status}): {detail}"))
        }
        _ => ChannelError::Storage(format!("unexpected Firestore response ({status}): {detail}")),
    }
}

pub(crate) fn classify_transport(err: reqwest::Error) -> ChannelError {
    if err.is_decode() {
        ChannelError::Storage(format!("undecodable Firestore response: {err}"))
    } else if err.is_builder() {
        ChannelError::Configuration(format!("invalid Firestore request: {err}"))
    } else {
        ChannelError::Transient(format!("Firestore unreachable: {err}"))
    }
}

/// A read-mark aimed at a document that does not exist. Missing projects or
/// databases also answer 404 and do not match.
pub(crate) fn is_missing_document(status: StatusCode, body: &str) -> bool {
    let Ok(ErrorEnvelope { error }) = serde_json::from_str::<ErrorEnvelope>(body) else {
        return false;
    };
    match status.as_u16() {
        404 => error.status == "NOT_FOUND" && error.message.starts_with("No document to update"),
        400 => error.status == "FAILED_PRECONDITION",
        _ => false,
    }
}

/// Passes successful responses through; turns everything else into an error.
pub(crate) async fn ensure_success(response: Response) -> Result<Response, ChannelError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_status(status, &body))
}
