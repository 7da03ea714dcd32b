//! Queue service module

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::queue::{
    errors::{QueryMessagesError, SaveMessageError},
    MessageId, MessagePage, MessageQuery, MessageStore, NewMessage,
};

/// Queue service
#[async_trait]
pub trait QueueService: Clone + Send + Sync + 'static {
    /// Admits a message to the queue for later delivery.
    ///
    /// # Arguments
    /// * `message` - A reference to the [`NewMessage`] to queue.
    ///
    /// # Returns
    /// A [`Result`] which is [`Ok`] containing the queued message's id if it was accepted,
    /// or an [`Err`] containing a [`SaveMessageError`] if it was rejected. A rejected message
    /// is never written to the store.
    async fn save_message(&self, message: &NewMessage) -> Result<MessageId, SaveMessageError>;

    /// Reads a page of the queue for inspection.
    ///
    /// # Arguments
    /// * `query` - The filters and paging to apply.
    ///
    /// # Returns
    /// A [`MessagePage`] with the matching messages and the total number of matches.
    async fn query_messages(&self, query: &MessageQuery)
        -> Result<MessagePage, QueryMessagesError>;
}

/// Queue service implementation
#[derive(Debug, Clone)]
pub struct QueueServiceImpl<S>
where
    S: MessageStore,
{
    store: Arc<S>,
}

impl<S> QueueServiceImpl<S>
where
    S: MessageStore,
{
    /// Create a new queue service
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S> QueueService for QueueServiceImpl<S>
where
    S: MessageStore,
{
    async fn save_message(&self, message: &NewMessage) -> Result<MessageId, SaveMessageError> {
        if let Err(err) = message.check_admissible() {
            warn!("Ignoring message: {}", err);

            return Err(err);
        }

        let id = self.store.insert_message(message).await.map_err(|err| {
            warn!("Could not save message: {}", err);
            err
        })?;

        debug!("Queued message {}", id);

        Ok(id)
    }

    async fn query_messages(
        &self,
        query: &MessageQuery,
    ) -> Result<MessagePage, QueryMessagesError> {
        let total_count = self.store.count_messages(query).await?;
        let items = self.store.find_messages(query).await?;

        Ok(MessagePage { items, total_count })
    }
}
