//! The outbound message queue: the message model, the store contract and the admission service.

mod message;
mod query;
mod repository;
mod service;

pub mod errors;

pub use message::{Attachment, Body, BodyKind, Message, MessageId, MessageStatus, NewMessage};
pub use query::{MessagePage, MessageQuery};
pub use repository::MessageStore;
pub use service::{QueueService, QueueServiceImpl};

pub(crate) use message::is_blank;
