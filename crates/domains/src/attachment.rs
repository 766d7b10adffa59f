//! # Attachments
//!
//! File and audio payloads travel inside the message content as
//! `data:<mime>;base64,<payload>` URIs.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use mime::Mime;

use crate::errors::DomainError;

#[derive(Debug, Clone, PartialEq)]
pub struct DataUri {
    pub mime: Mime,
    pub bytes: Bytes,
}

impl DataUri {
    pub fn new(mime: Mime, bytes: impl Into<Bytes>) -> Self {
        Self { mime, bytes: bytes.into() }
    }

    pub fn encode(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }

    /// Only base64 payloads are accepted; an empty media type means `text/plain`.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let rest = raw
            .strip_prefix("data:")
            .ok_or_else(|| DomainError::InvalidDataUri("missing data: scheme".into()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| DomainError::InvalidDataUri("missing payload separator".into()))?;
        let media_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| DomainError::InvalidDataUri("payload is not base64".into()))?;

        let mime = if media_type.is_empty() {
            mime::TEXT_PLAIN
        } else {
            media_type
                .parse::<Mime>()
                .map_err(|e| DomainError::InvalidDataUri(e.to_string()))?
        };
        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| DomainError::InvalidDataUri(e.to_string()))?;

        Ok(Self { mime, bytes: Bytes::from(bytes) })
    }
}
