//! Queued message model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::SaveMessageError;

/// Identifier assigned to a message when the store persists it
pub type MessageId = Uuid;

/// Delivery status of a queued message
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    /// Waiting for a successful delivery attempt
    #[default]
    NotSent,

    /// Accepted by the relay
    Sent,
}

impl MessageStatus {
    /// The persisted representation of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotSent => "NOT_SENT",
            Self::Sent => "SENT",
        }
    }

    /// Whether the message has already been delivered
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }
}

impl TryFrom<&str> for MessageStatus {
    type Error = anyhow::Error;

    fn try_from(raw: &str) -> Result<Self, Self::Error> {
        match raw {
            "NOT_SENT" => Ok(Self::NotSent),
            "SENT" => Ok(Self::Sent),
            other => Err(anyhow::anyhow!("unknown message status: {other}")),
        }
    }
}

/// How the body text should be rendered
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BodyKind {
    /// Plain text
    #[default]
    Plain,

    /// HTML
    Html,
}

impl BodyKind {
    /// The persisted representation of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Html => "HTML",
        }
    }
}

impl From<&str> for BodyKind {
    /// Anything that isn't recognisably HTML is rendered as plain text.
    fn from(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("HTML") {
            Self::Html
        } else {
            Self::Plain
        }
    }
}

/// Message body
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Body {
    /// The content kind
    pub kind: BodyKind,

    /// The body text
    pub text: String,
}

impl Body {
    /// A plain text body
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            kind: BodyKind::Plain,
            text: text.into(),
        }
    }

    /// An HTML body
    pub fn html(text: impl Into<String>) -> Self {
        Self {
            kind: BodyKind::Html,
            text: text.into(),
        }
    }

    /// Whether the body has any non-whitespace text
    pub fn is_blank(&self) -> bool {
        is_blank(&self.text)
    }
}

/// A file attached to a message
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// The file name
    pub name: String,

    /// The declared MIME content type, e.g. `text/plain`
    pub content_type: String,

    /// Optional `Content-Description`
    pub description: Option<String>,

    /// Optional `Content-Disposition`, passed through verbatim
    pub disposition: Option<String>,

    /// The raw payload
    pub payload: Vec<u8>,
}

impl Attachment {
    /// Create a new attachment without a description or disposition
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            description: None,
            disposition: None,
            payload,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the disposition
    pub fn with_disposition(mut self, disposition: impl Into<String>) -> Self {
        self.disposition = Some(disposition.into());
        self
    }
}

/// A message submitted for queueing, before the store has assigned it an identity
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    /// The sender address
    pub sender: String,

    /// `To` recipients
    pub to: Vec<String>,

    /// `Cc` recipients
    pub cc: Vec<String>,

    /// `Bcc` recipients
    pub bcc: Vec<String>,

    /// The subject line
    pub subject: String,

    /// The body
    pub body: Body,

    /// Attachments, in order
    pub attachments: Vec<Attachment>,
}

impl NewMessage {
    /// Create a new message from `sender` with the given subject and body
    pub fn new(sender: impl Into<String>, subject: impl Into<String>, body: Body) -> Self {
        Self {
            sender: sender.into(),
            subject: subject.into(),
            body,
            ..Default::default()
        }
    }

    /// Add a `To` recipient
    pub fn to(mut self, address: impl Into<String>) -> Self {
        self.to.push(address.into());
        self
    }

    /// Add a `Cc` recipient
    pub fn cc(mut self, address: impl Into<String>) -> Self {
        self.cc.push(address.into());
        self
    }

    /// Add a `Bcc` recipient
    pub fn bcc(mut self, address: impl Into<String>) -> Self {
        self.bcc.push(address.into());
        self
    }

    /// Add an attachment
    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Checks the message may be admitted to the queue.
    ///
    /// Rules are applied in order: at least one recipient, a sender, then a non-blank body.
    pub fn check_admissible(&self) -> Result<(), SaveMessageError> {
        if self.to.is_empty() && self.cc.is_empty() && self.bcc.is_empty() {
            return Err(SaveMessageError::NoRecipients);
        }

        if is_blank(&self.sender) {
            return Err(SaveMessageError::MissingSender);
        }

        if self.body.is_blank() {
            return Err(SaveMessageError::MissingBody);
        }

        Ok(())
    }
}

/// A message held in the queue
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// The store-assigned identity
    pub id: MessageId,

    /// The sender address
    pub sender: String,

    /// `To` recipients
    pub to: Vec<String>,

    /// `Cc` recipients
    pub cc: Vec<String>,

    /// `Bcc` recipients
    pub bcc: Vec<String>,

    /// The subject line
    pub subject: String,

    /// The body
    pub body: Body,

    /// Attachments, in order
    pub attachments: Vec<Attachment>,

    /// Delivery status
    pub status: MessageStatus,

    /// When the message was admitted
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Build the queued form of `message`, as a store does when inserting it
    pub fn queued(id: MessageId, message: &NewMessage, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            sender: message.sender.clone(),
            to: message.to.clone(),
            cc: message.cc.clone(),
            bcc: message.bcc.clone(),
            subject: message.subject.clone(),
            body: message.body.clone(),
            attachments: message.attachments.clone(),
            status: MessageStatus::NotSent,
            created_at,
        }
    }

    /// Record a confirmed delivery. There is no way back to [`MessageStatus::NotSent`].
    pub fn mark_sent(&mut self) {
        self.status = MessageStatus::Sent;
    }
}

pub(crate) fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
