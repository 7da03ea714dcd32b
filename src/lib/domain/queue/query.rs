//! Queue inspection filters

use serde::{Deserialize, Serialize};

use super::{Message, MessageStatus};

/// Filter and paging parameters for reading the queue
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageQuery {
    /// Only messages with this status
    pub status: Option<MessageStatus>,

    /// Only messages from this sender
    pub sender: Option<String>,

    /// Number of matching messages to skip
    pub offset: i64,

    /// Maximum number of messages to return, unbounded when `None`
    pub limit: Option<i64>,
}

impl MessageQuery {
    /// Every message in the queue
    pub fn all() -> Self {
        Self::default()
    }

    /// Every message with the given status
    pub fn with_status(status: MessageStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Restrict to messages from `sender`
    pub fn from_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Return at most `limit` messages, starting at `offset`
    pub fn page(mut self, offset: i64, limit: i64) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }

    /// Whether `message` passes the filters, ignoring paging
    pub fn matches(&self, message: &Message) -> bool {
        self.status.map_or(true, |status| message.status == status)
            && self
                .sender
                .as_ref()
                .map_or(true, |sender| &message.sender == sender)
    }
}

/// One page of queued messages
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePage {
    /// The messages on this page, in store order
    pub items: Vec<Message>,

    /// Number of messages matching the filters, regardless of paging
    pub total_count: i64,
}
