//! # Errors
//!
//! Error taxonomy shared by every layer of office-chat.
//! Channel failures are classified so that services can decide what reaches
//! the user and what is only logged.

use thiserror::Error;

use crate::models::MessageId;

/// Violations of the message invariants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("message has no identifier")]
    MissingId,

    #[error("message {0} has no sender")]
    MissingSender(MessageId),

    /// File messages must name the file they carry.
    #[error("file message {0} has no file name")]
    MissingFileName(MessageId),

    /// Only file messages may carry a file name.
    #[error("message {0} carries a file name but is not a file")]
    UnexpectedFileName(MessageId),

    #[error("text message {0} is empty")]
    EmptyText(MessageId),

    #[error("malformed data URI: {0}")]
    InvalidDataUri(String),
}

/// Failures reported by a [`DeliveryChannel`](crate::ports::DeliveryChannel).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// Missing or invalid credentials, denied access rules. Needs an operator.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Connectivity trouble; the backend is expected to recover on its own.
    #[error("transient connectivity error: {0}")]
    Transient(String),

    #[error("message {0} already exists")]
    DuplicateId(MessageId),

    #[error("invalid message: {0}")]
    InvalidMessage(#[from] DomainError),

    /// Local I/O failure or undecodable stored data.
    #[error("storage error: {0}")]
    Storage(String),
}

impl ChannelError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// Login failures against the roster and the shared PIN.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("select your name first")]
    NoUserSelected,

    #[error("unknown user {0}")]
    UnknownUser(String),

    #[error("wrong PIN")]
    WrongPin,
}
