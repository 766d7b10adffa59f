//! Turning files on disk into message payloads.

use std::path::Path;

use domains::DataUri;

use crate::notice::UserNotice;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub data_uri: String,
}

/// Reads `path` and encodes it as a data URI with a MIME type guessed from
/// the extension. Any failure is reported immediately to the user.
pub async fn load(path: &Path) -> Result<Attachment, UserNotice> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| UserNotice::MediaAccess(format!("{} is not a file", path.display())))?
        .to_string();

    let bytes = tokio::fs::read(path).await.map_err(|e| {
        tracing::warn!(path = %path.display(), error = %e, "attachment unreadable");
        UserNotice::MediaAccess(format!("{}: {e}", path.display()))
    })?;

    let mime = mime_guess::from_path(path).first_or_octet_stream();
    tracing::debug!(file = %file_name, %mime, size = bytes.len(), "attachment loaded");

    Ok(Attachment {
        file_name,
        data_uri: DataUri::new(mime, bytes).encode(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn encodes_file_with_guessed_mime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt");
        std::fs::write(&path, b"ciao").unwrap();

        let attachment = load(&path).await.unwrap();
        assert_eq!(attachment.file_name, "note.txt");
        assert_eq!(attachment.data_uri, "data:text/plain;base64,Y2lhbw==");
    }

    #[tokio::test]
    async fn missing_file_is_a_media_access_notice() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("missing.webm")).await.unwrap_err();
        assert!(matches!(err, UserNotice::MediaAccess(_)));
    }
}
