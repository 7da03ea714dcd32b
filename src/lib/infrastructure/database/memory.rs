//! In-memory message store

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::queue::{
    errors::{QueryMessagesError, SaveMessageError, UpdateMessagesError},
    Message, MessageId, MessageQuery, MessageStore, NewMessage,
};

/// An in-memory message store for tests and local runs.
///
/// Messages are kept in insertion order, which is also the order they are fetched in.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMessageStore {
    messages: Arc<Mutex<Vec<Message>>>,
}

impl InMemoryMessageStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of every stored message
    pub async fn snapshot(&self) -> Vec<Message> {
        self.messages.lock().await.clone()
    }

    /// Look up a single message
    pub async fn get(&self, id: &MessageId) -> Option<Message> {
        self.messages
            .lock()
            .await
            .iter()
            .find(|message| &message.id == id)
            .cloned()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn insert_message(&self, message: &NewMessage) -> Result<MessageId, SaveMessageError> {
        let queued = Message::queued(Uuid::now_v7(), message, Utc::now());
        let id = queued.id;

        self.messages.lock().await.push(queued);

        Ok(id)
    }

    async fn count_messages(&self, query: &MessageQuery) -> Result<i64, QueryMessagesError> {
        let messages = self.messages.lock().await;

        Ok(messages.iter().filter(|message| query.matches(message)).count() as i64)
    }

    async fn find_messages(&self, query: &MessageQuery) -> Result<Vec<Message>, QueryMessagesError> {
        let messages = self.messages.lock().await;

        let offset = usize::try_from(query.offset).unwrap_or(0);
        let limit = query
            .limit
            .map_or(usize::MAX, |limit| usize::try_from(limit).unwrap_or(0));

        Ok(messages
            .iter()
            .filter(|message| query.matches(message))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn update_messages(&self, updates: &[Message]) -> Result<(), UpdateMessagesError> {
        let mut messages = self.messages.lock().await;

        let positions = updates
            .iter()
            .map(|update| {
                messages
                    .iter()
                    .position(|message| message.id == update.id)
                    .ok_or_else(|| {
                        UpdateMessagesError::UnknownError(anyhow::anyhow!(
                            "message {} not found",
                            update.id
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (position, update) in positions.into_iter().zip(updates) {
            if update.status.is_sent() {
                messages[position].mark_sent();
            }
        }

        Ok(())
    }
}
