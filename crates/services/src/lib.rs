//! # services
//!
//! Everything the presentation layer needs, expressed over the ports in
//! `domains`. Backend errors stop here: callers only ever see a result, an
//! empty result, or a [`UserNotice`] meant to be shown as-is.

pub mod attachments;
pub mod auth;
pub mod chat;
pub mod conversation;
pub mod notice;

pub use chat::ChatService;
pub use notice::UserNotice;
