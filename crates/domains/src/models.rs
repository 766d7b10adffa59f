//! # Domain Models
//!
//! The message shape shared by every delivery channel.
//! Identifiers and timestamps are assigned by the sender at creation time,
//! never by the store, so they stay stable whichever backend carries them.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

/// Content of every busy-signal message.
pub const BUSY_SIGNAL_CONTENT: &str = "Occupato";

/// Wire marker for messages addressed to the whole office.
pub const BROADCAST_MARKER: &str = "ALL";

/// A colleague from the fixed roster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Caller-generated message identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Random UUID v4, unique across machines without coordination.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Who a message is addressed to. Serialised as the user id, or `"ALL"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Recipient {
    User(String),
    Broadcast,
}

impl Recipient {
    pub fn user(id: impl Into<String>) -> Self {
        Self::User(id.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::User(id) => id,
            Self::Broadcast => BROADCAST_MARKER,
        }
    }

    /// True only for a direct address to `user_id`.
    pub fn is_user(&self, user_id: &str) -> bool {
        matches!(self, Self::User(id) if id == user_id)
    }
}

impl From<String> for Recipient {
    fn from(raw: String) -> Self {
        if raw == BROADCAST_MARKER {
            Self::Broadcast
        } else {
            Self::User(raw)
        }
    }
}

impl From<Recipient> for String {
    fn from(recipient: Recipient) -> Self {
        match recipient {
            Recipient::User(id) => id,
            Recipient::Broadcast => BROADCAST_MARKER.to_string(),
        }
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    Text,
    Audio,
    File,
    BusySignal,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Audio => "AUDIO",
            Self::File => "FILE",
            Self::BusySignal => "BUSY_SIGNAL",
        }
    }

    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "TEXT" => Some(Self::Text),
            "AUDIO" => Some(Self::Audio),
            "FILE" => Some(Self::File),
            "BUSY_SIGNAL" => Some(Self::BusySignal),
            _ => None,
        }
    }
}

/// The fundamental unit of conversation.
///
/// Only `read` may change after creation; everything else is fixed by the
/// sender. `file_name` is present if and only if `kind` is [`MessageKind::File`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub sender_id: String,
    /// Sender's display name, copied at send time.
    pub sender_name: String,
    pub recipient_id: Recipient,
    /// Text, or a data URI for file and audio messages.
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Milliseconds since the epoch, from the sender's clock.
    pub timestamp: i64,
    #[serde(default)]
    pub read: bool,
}

impl Message {
    fn compose(
        sender: &User,
        recipient: Recipient,
        kind: MessageKind,
        content: String,
        file_name: Option<String>,
    ) -> Self {
        Self {
            id: MessageId::generate(),
            sender_id: sender.id.clone(),
            sender_name: sender.name.clone(),
            recipient_id: recipient,
            content,
            file_name,
            kind,
            timestamp: Utc::now().timestamp_millis(),
            read: false,
        }
    }

    pub fn text(sender: &User, recipient: Recipient, content: impl Into<String>) -> Self {
        Self::compose(sender, recipient, MessageKind::Text, content.into(), None)
    }

    /// `data_uri` is the encoded file body, see [`DataUri`](crate::attachment::DataUri).
    pub fn file(
        sender: &User,
        recipient: Recipient,
        file_name: impl Into<String>,
        data_uri: impl Into<String>,
    ) -> Self {
        Self::compose(
            sender,
            recipient,
            MessageKind::File,
            data_uri.into(),
            Some(file_name.into()),
        )
    }

    pub fn audio(sender: &User, recipient: Recipient, data_uri: impl Into<String>) -> Self {
        Self::compose(sender, recipient, MessageKind::Audio, data_uri.into(), None)
    }

    /// Sent automatically when a notification is dismissed.
    pub fn busy_signal(sender: &User, recipient: Recipient) -> Self {
        Self::compose(
            sender,
            recipient,
            MessageKind::BusySignal,
            BUSY_SIGNAL_CONTENT.to_string(),
            None,
        )
    }

    pub fn is_from(&self, user_id: &str) -> bool {
        self.sender_id == user_id
    }

    pub fn is_to(&self, user_id: &str) -> bool {
        self.recipient_id.is_user(user_id)
    }

    /// Checks the invariants every stored message must satisfy.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.id.is_empty() {
            return Err(DomainError::MissingId);
        }
        if self.sender_id.trim().is_empty() {
            return Err(DomainError::MissingSender(self.id.clone()));
        }
        match (self.kind, &self.file_name) {
            (MessageKind::File, None) => return Err(DomainError::MissingFileName(self.id.clone())),
            (MessageKind::File, Some(name)) if name.trim().is_empty() => {
                return Err(DomainError::MissingFileName(self.id.clone()))
            }
            (MessageKind::File, Some(_)) => {}
            (_, Some(_)) => return Err(DomainError::UnexpectedFileName(self.id.clone())),
            (_, None) => {}
        }
        if self.kind == MessageKind::Text && self.content.trim().is_empty() {
            return Err(DomainError::EmptyText(self.id.clone()));
        }
        Ok(())
    }

    /// One-line summary shown in notifications.
    pub fn preview(&self) -> String {
        match self.kind {
            MessageKind::Text => self.content.clone(),
            MessageKind::Audio => "Messaggio vocale".to_string(),
            MessageKind::File => format!("File: {}", self.file_name.as_deref().unwrap_or("?")),
            MessageKind::BusySignal => "Non posso rispondere ora.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn franco() -> User {
        User { id: "1".into(), name: "Franco C.".into(), role: Some("Admin".into()) }
    }

    #[test]
    fn serialises_with_wire_field_names() {
        let mut msg = Message::text(&franco(), Recipient::user("2"), "Ciao");
        msg.id = MessageId::new("m-1");
        msg.timestamp = 1_700_000_000_000;

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["senderId"], "1");
        assert_eq!(json["senderName"], "Franco C.");
        assert_eq!(json["recipientId"], "2");
        assert_eq!(json["type"], "TEXT");
        assert_eq!(json["read"], false);
        assert!(json.get("fileName").is_none());
    }

    #[test]
    fn broadcast_marker_maps_to_recipient_variant() {
        let json = serde_json::json!({
            "id": "m-2", "senderId": "1", "senderName": "Franco C.",
            "recipientId": "ALL", "content": "Riunione alle 15",
            "type": "TEXT", "timestamp": 5
        });
        let msg: Message = serde_json::from_value(json).unwrap();
        assert_eq!(msg.recipient_id, Recipient::Broadcast);
        assert!(!msg.read);
        assert!(!msg.is_to("2"));
    }

    #[test]
    fn busy_signal_kind_uses_screaming_case() {
        let msg = Message::busy_signal(&franco(), Recipient::user("3"));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "BUSY_SIGNAL");
        assert_eq!(msg.content, BUSY_SIGNAL_CONTENT);
        assert_eq!(MessageKind::from_wire("BUSY_SIGNAL"), Some(MessageKind::BusySignal));
    }

    #[test]
    fn file_name_only_on_file_messages() {
        let file = Message::file(&franco(), Recipient::user("2"), "a.pdf", "data:application/pdf;base64,AA==");
        assert!(file.validate().is_ok());

        let mut missing = file.clone();
        missing.file_name = None;
        assert!(matches!(missing.validate(), Err(DomainError::MissingFileName(_))));

        let mut text = Message::text(&franco(), Recipient::user("2"), "ciao");
        text.file_name = Some("x.txt".into());
        assert!(matches!(text.validate(), Err(DomainError::UnexpectedFileName(_))));
    }

    #[test]
    fn blank_text_is_rejected() {
        let msg = Message::text(&franco(), Recipient::user("2"), "   ");
        assert!(matches!(msg.validate(), Err(DomainError::EmptyText(_))));
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(MessageId::generate(), MessageId::generate());
    }

    #[test]
    fn preview_per_kind() {
        let sender = franco();
        assert_eq!(Message::text(&sender, Recipient::user("2"), "ok").preview(), "ok");
        assert_eq!(
            Message::file(&sender, Recipient::user("2"), "q.xlsx", "data:;base64,").preview(),
            "File: q.xlsx"
        );
        assert_eq!(Message::audio(&sender, Recipient::user("2"), "data:;base64,").preview(), "Messaggio vocale");
    }
}
