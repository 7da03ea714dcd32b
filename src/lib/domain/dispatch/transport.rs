//! Mail transport module

use async_trait::async_trait;
use lettre::Message;

#[cfg(test)]
use mockall::mock;

use crate::domain::dispatch::errors::TransportError;

/// Something that can open sessions with a mail relay
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// The session type handed out by [`Transport::open`]
    type Session: TransportSession;

    /// Open a new session with the relay
    ///
    /// # Returns
    /// A [`Result`] which is [`Ok`] containing an open session, or an [`Err`] containing
    /// [`TransportError::ConnectError`] if the relay could not be reached.
    async fn open(&self) -> Result<Self::Session, TransportError>;
}

/// An open session with a mail relay
#[async_trait]
pub trait TransportSession: Send {
    /// Hand a composed message to the relay
    ///
    /// # Arguments
    /// * `message` - The fully composed [`Message`].
    ///
    /// # Returns
    /// [`Ok`] once the relay has accepted the message.
    async fn send(&mut self, message: &Message) -> Result<(), TransportError>;

    /// Close the session. Failures are logged, never returned.
    async fn close(&mut self);
}

#[cfg(test)]
mock! {
    pub TransportSession {}

    #[async_trait]
    impl TransportSession for TransportSession {
        async fn send(&mut self, message: &Message) -> Result<(), TransportError>;
        async fn close(&mut self);
    }
}

#[cfg(test)]
mock! {
    pub Transport {}

    #[async_trait]
    impl Transport for Transport {
        type Session = MockTransportSession;

        async fn open(&self) -> Result<MockTransportSession, TransportError>;
    }
}
