//! Error types for composing and delivering queued messages

use lettre::{address::AddressError, error::Error as EmailError};
use thiserror::Error;

use crate::domain::queue::errors::{QueryMessagesError, UpdateMessagesError};

/// Reasons a message could not be turned into something the relay can accept
#[derive(Debug, Error)]
pub enum ComposeError {
    /// The subject is blank
    #[error("message has no subject")]
    MissingSubject,

    /// The sender is blank
    #[error("message has no sender")]
    MissingSender,

    /// An address could not be parsed
    #[error("invalid address {address:?}")]
    InvalidAddress {
        /// The offending address
        address: String,
        /// Why it was rejected
        #[source]
        source: AddressError,
    },

    /// An attachment declares a content type that could not be parsed
    #[error("invalid content type {0:?}")]
    InvalidContentType(String),

    /// The message could not be assembled
    #[error(transparent)]
    Build(#[from] EmailError),
}

impl ComposeError {
    /// Whether the message is being parked rather than having failed.
    ///
    /// Parked messages are left in the queue untouched and aren't counted as failures.
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::MissingSubject | Self::MissingSender)
    }
}

/// Errors raised by a [`Transport`](super::Transport) or its sessions
#[derive(Debug, Error)]
pub enum TransportError {
    /// A session with the relay could not be established
    #[error("could not connect to the relay: {0}")]
    ConnectError(String),

    /// The relay did not accept a message
    #[error("could not deliver the message: {0}")]
    DeliveryError(String),

    /// Unknown error
    #[error(transparent)]
    UnknownError(#[from] anyhow::Error),
}

/// Errors that abort a whole dispatch cycle
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The cycle permit could not be acquired
    #[error("could not acquire the dispatch lock")]
    LockUnavailable,

    /// Pending messages could not be read
    #[error("could not read pending messages")]
    Query(#[from] QueryMessagesError),

    /// The relay session could not be opened
    #[error("could not open a relay session")]
    Session(#[from] TransportError),

    /// Delivered messages could not be marked as sent
    #[error("could not persist sent messages")]
    Update(#[from] UpdateMessagesError),
}
