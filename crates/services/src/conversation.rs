//! # Conversation queries
//!
//! Pure views over a snapshot handed out by a delivery channel.
//! A thread is the direct exchange between two users; broadcasts are not
//! part of any thread and never count as unread.

use domains::{Message, MessageId, MessageKind};

/// How recent an unread message must be to raise a notification.
pub const NOTIFICATION_WINDOW_MS: i64 = 10_000;

pub const APP_TITLE: &str = "WorkChat Pro";

/// Messages between `me` and `partner`, in snapshot order.
pub fn thread<'a>(messages: &'a [Message], me: &str, partner: &str) -> Vec<&'a Message> {
    messages
        .iter()
        .filter(|m| (m.is_to(me) && m.is_from(partner)) || (m.is_from(me) && m.is_to(partner)))
        .collect()
}

pub fn unread_count(messages: &[Message], me: &str) -> usize {
    messages.iter().filter(|m| m.is_to(me) && !m.read).count()
}

/// Unread messages `partner` sent to `me`.
pub fn unread_in_thread(messages: &[Message], me: &str, partner: &str) -> Vec<MessageId> {
    messages
        .iter()
        .filter(|m| m.is_to(me) && m.is_from(partner) && !m.read)
        .map(|m| m.id.clone())
        .collect()
}

/// The last message of the thread, if it is a text `partner` sent to `me`.
pub fn last_inbound_text<'a>(messages: &'a [Message], me: &str, partner: &str) -> Option<&'a Message> {
    thread(messages, me, partner)
        .last()
        .copied()
        .filter(|m| m.is_to(me) && m.kind == MessageKind::Text)
}

/// Most recent unread message from someone else, if it arrived within
/// [`NOTIFICATION_WINDOW_MS`] of `now_ms`.
pub fn notification_candidate<'a>(messages: &'a [Message], me: &str, now_ms: i64) -> Option<&'a Message> {
    messages
        .iter()
        .filter(|m| m.is_to(me) && !m.read && !m.is_from(me))
        .last()
        .filter(|m| now_ms - m.timestamp < NOTIFICATION_WINDOW_MS)
}

pub fn window_title(unread: usize) -> String {
    if unread > 0 {
        format!("({unread}) WorkChat - Nuovi Messaggi")
    } else {
        APP_TITLE.to_string()
    }
}
