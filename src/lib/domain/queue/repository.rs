//! Message store module

use async_trait::async_trait;

#[cfg(test)]
use mockall::mock;

use crate::domain::queue::{
    errors::{QueryMessagesError, SaveMessageError, UpdateMessagesError},
    Message, MessageId, MessageQuery, NewMessage,
};

/// Durable storage for queued messages
#[async_trait]
pub trait MessageStore: Clone + Send + Sync + 'static {
    /// Persist a new message with status `NOT_SENT` and return its identity
    async fn insert_message(&self, message: &NewMessage) -> Result<MessageId, SaveMessageError>;

    /// Count the messages matching `query`, ignoring its paging
    async fn count_messages(&self, query: &MessageQuery) -> Result<i64, QueryMessagesError>;

    /// Fetch the messages matching `query`, in store order
    async fn find_messages(&self, query: &MessageQuery) -> Result<Vec<Message>, QueryMessagesError>;

    /// Persist the status of every message in one batch.
    ///
    /// A message already stored as sent is never moved back to not sent.
    async fn update_messages(&self, messages: &[Message]) -> Result<(), UpdateMessagesError>;
}

#[cfg(test)]
mock! {
    pub MessageStore {}

    impl Clone for MessageStore {
        fn clone(&self) -> Self;
    }

    #[async_trait]
    impl MessageStore for MessageStore {
        async fn insert_message(&self, message: &NewMessage) -> Result<MessageId, SaveMessageError>;
        async fn count_messages(&self, query: &MessageQuery) -> Result<i64, QueryMessagesError>;
        async fn find_messages(&self, query: &MessageQuery) -> Result<Vec<Message>, QueryMessagesError>;
        async fn update_messages(&self, messages: &[Message]) -> Result<(), UpdateMessagesError>;
    }
}
