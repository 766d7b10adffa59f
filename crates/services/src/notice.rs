use domains::ChannelError;
use thiserror::Error;

/// Human-readable failure for the person at the keyboard.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UserNotice {
    /// Needs an operator: credentials or backend access rules are wrong.
    #[error("the chat backend refused the request ({0}); ask an administrator to check the backend access rules")]
    Configuration(String),

    #[error("message not sent: {0}")]
    NotSent(String),

    #[error("cannot use the attachment: {0}")]
    MediaAccess(String),
}

impl From<ChannelError> for UserNotice {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Configuration(reason) => Self::Configuration(reason),
            other => Self::NotSent(other.to_string()),
        }
    }
}
