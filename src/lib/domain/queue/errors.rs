//! Error types for the message queue

use anyhow::anyhow;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur when admitting a message to the queue
#[derive(Debug, Error)]
pub enum SaveMessageError {
    /// None of `to`, `cc` or `bcc` has an address
    #[error("message has no recipients")]
    NoRecipients,

    /// The sender is blank
    #[error("message has no sender")]
    MissingSender,

    /// The body is blank
    #[error("message has no body")]
    MissingBody,

    /// Unknown error
    #[error(transparent)]
    UnknownError(#[from] anyhow::Error),
}

impl SaveMessageError {
    /// Whether the message itself was rejected, as opposed to the store failing
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Self::UnknownError(_))
    }
}

/// Errors that can occur when counting or reading queued messages
#[derive(Debug, Error)]
pub enum QueryMessagesError {
    /// Unknown error
    #[error(transparent)]
    UnknownError(#[from] anyhow::Error),
}

/// Errors that can occur when persisting status changes
#[derive(Debug, Error)]
pub enum UpdateMessagesError {
    /// Unknown error
    #[error(transparent)]
    UnknownError(#[from] anyhow::Error),
}

impl From<sqlx::Error> for SaveMessageError {
    fn from(err: sqlx::Error) -> Self {
        debug!("sqlxError: {:?}", err);

        SaveMessageError::UnknownError(anyhow!("Unknown database error: {:?}", err))
    }
}

impl From<sqlx::Error> for QueryMessagesError {
    fn from(err: sqlx::Error) -> Self {
        debug!("sqlxError: {:?}", err);

        QueryMessagesError::UnknownError(anyhow!("Unknown database error: {:?}", err))
    }
}

impl From<sqlx::Error> for UpdateMessagesError {
    fn from(err: sqlx::Error) -> Self {
        debug!("sqlxError: {:?}", err);

        UpdateMessagesError::UnknownError(anyhow!("Unknown database error: {:?}", err))
    }
}
