//! Mapping between [`Message`] and Firestore's typed field values
//! (`{"stringValue": ..}`, `{"integerValue": "<i64>"}`, ...).

use std::collections::HashMap;

use domains::{ChannelError, Message, MessageId, MessageKind, Recipient};
use serde::Deserialize;
use serde_json::{json, Map, Value};

/// A stored document as returned by the REST API.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Document {
    pub name: String,
    #[serde(default)]
    pub fields: HashMap<String, Value>,
}

/// One element of a `runQuery` response stream.
#[derive(Debug, Deserialize)]
pub(crate) struct QueryItem {
    #[serde(default)]
    pub document: Option<Document>,
}

pub(crate) fn encode_fields(message: &Message) -> Value {
    let mut fields = Map::new();
    fields.insert("id".into(), json!({ "stringValue": message.id.as_str() }));
    fields.insert("senderId".into(), json!({ "stringValue": message.sender_id }));
    fields.insert("senderName".into(), json!({ "stringValue": message.sender_name }));
    fields.insert("recipientId".into(), json!({ "stringValue": message.recipient_id.as_str() }));
    fields.insert("content".into(), json!({ "stringValue": message.content }));
    if let Some(file_name) = &message.file_name {
        fields.insert("fileName".into(), json!({ "stringValue": file_name }));
    }
    fields.insert("type".into(), json!({ "stringValue": message.kind.as_str() }));
    // Firestore carries 64-bit integers as decimal strings.
    fields.insert("timestamp".into(), json!({ "integerValue": message.timestamp.to_string() }));
    fields.insert("read".into(), json!({ "booleanValue": message.read }));
    Value::Object(fields)
}

fn malformed(doc: &Document, what: &str) -> ChannelError {
    ChannelError::Storage(format!("document {} has no valid {what}", doc.name))
}

fn string_field(doc: &Document, key: &str) -> Option<String> {
    doc.fields
        .get(key)?
        .get("stringValue")?
        .as_str()
        .map(str::to_string)
}

fn integer_field(doc: &Document, key: &str) -> Option<i64> {
    let value = doc.fields.get(key)?;
    if let Some(raw) = value.get("integerValue") {
        return match raw {
            Value::String(s) => s.parse().ok(),
            other => other.as_i64(),
        };
    }
    value.get("doubleValue")?.as_f64().map(|f| f as i64)
}

fn boolean_field(doc: &Document, key: &str) -> Option<bool> {
    doc.fields.get(key)?.get("booleanValue")?.as_bool()
}

/// The document name's last segment is the message id.
pub(crate) fn decode_document(doc: &Document) -> Result<Message, ChannelError> {
    let id = doc
        .name
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| malformed(doc, "name"))?;
    let kind = string_field(doc, "type")
        .as_deref()
        .and_then(MessageKind::from_wire)
        .ok_or_else(|| malformed(doc, "type"))?;

    Ok(Message {
        id: MessageId::new(id),
        sender_id: string_field(doc, "senderId").ok_or_else(|| malformed(doc, "senderId"))?,
        sender_name: string_field(doc, "senderName").unwrap_or_default(),
        recipient_id: Recipient::from(
            string_field(doc, "recipientId").ok_or_else(|| malformed(doc, "recipientId"))?,
        ),
        content: string_field(doc, "content").unwrap_or_default(),
        file_name: string_field(doc, "fileName"),
        kind,
        timestamp: integer_field(doc, "timestamp").ok_or_else(|| malformed(doc, "timestamp"))?,
        read: boolean_field(doc, "read").unwrap_or(false),
    })
}
