//! Builds relay-ready messages from queued ones

use std::error::Error as StdError;

use lettre::message::{
    header::{ContentDisposition, ContentType, Header, HeaderName, HeaderValue},
    Mailbox, MessageBuilder, MultiPart, SinglePart,
};
use tracing::debug;

use crate::domain::{
    dispatch::errors::ComposeError,
    queue::{is_blank, Attachment, BodyKind, Message},
};

/// `Content-Description` header
#[derive(Clone, Debug, PartialEq, Eq)]
struct ContentDescription(String);

impl Header for ContentDescription {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("Content-Description")
    }

    fn parse(s: &str) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        Ok(Self(s.to_owned()))
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), self.0.clone())
    }
}

/// `Content-Disposition` header carried through exactly as it was queued
#[derive(Clone, Debug, PartialEq, Eq)]
struct RawContentDisposition(String);

impl Header for RawContentDisposition {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("Content-Disposition")
    }

    fn parse(s: &str) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        Ok(Self(s.to_owned()))
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), self.0.clone())
    }
}

/// Compose the message the relay will be handed.
///
/// A plain text message without attachments becomes a single part. Anything else becomes a
/// `multipart/mixed` with the body first, followed by one part per attachment in queue order.
///
/// # Returns
/// The composed [`lettre::Message`], or a [`ComposeError`]. Errors for which
/// [`ComposeError::is_skip`] holds mean the message should stay parked in the queue.
pub fn compose(message: &Message) -> Result<lettre::Message, ComposeError> {
    if is_blank(&message.subject) {
        return Err(ComposeError::MissingSubject);
    }

    if is_blank(&message.sender) {
        return Err(ComposeError::MissingSender);
    }

    let mut builder = lettre::Message::builder()
        .from(parse_mailbox(&message.sender)?)
        .subject(message.subject.clone());

    builder = add_recipients(builder, &message.to, MessageBuilder::to)?;
    builder = add_recipients(builder, &message.cc, MessageBuilder::cc)?;
    builder = add_recipients(builder, &message.bcc, MessageBuilder::bcc)?;

    if message.body.kind == BodyKind::Plain
        && !message.body.is_blank()
        && message.attachments.is_empty()
    {
        debug!("Composing {} as a single part", message.id);

        return Ok(builder
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.text.clone())?);
    }

    debug!(
        "Composing {} as multipart with {} attachment(s)",
        message.id,
        message.attachments.len()
    );

    let mut multipart = MultiPart::mixed().build();

    if !message.body.is_blank() {
        multipart = multipart.singlepart(match message.body.kind {
            BodyKind::Html => SinglePart::html(message.body.text.clone()),
            BodyKind::Plain => SinglePart::plain(message.body.text.clone()),
        });
    }

    for attachment in &message.attachments {
        multipart = multipart.singlepart(attachment_part(attachment)?);
    }

    Ok(builder.multipart(multipart)?)
}

fn add_recipients(
    mut builder: MessageBuilder,
    addresses: &[String],
    add: fn(MessageBuilder, Mailbox) -> MessageBuilder,
) -> Result<MessageBuilder, ComposeError> {
    for address in addresses {
        builder = add(builder, parse_mailbox(address)?);
    }

    Ok(builder)
}

fn parse_mailbox(address: &str) -> Result<Mailbox, ComposeError> {
    address
        .trim()
        .parse()
        .map_err(|source| ComposeError::InvalidAddress {
            address: address.to_string(),
            source,
        })
}

fn attachment_part(attachment: &Attachment) -> Result<SinglePart, ComposeError> {
    let content_type = ContentType::parse(&attachment.content_type)
        .map_err(|_| ComposeError::InvalidContentType(attachment.content_type.clone()))?;

    let mut part = SinglePart::builder().header(content_type);

    part = match attachment.disposition.as_deref().filter(|raw| !is_blank(raw)) {
        Some(raw) if raw.contains("filename") || is_blank(&attachment.name) => {
            part.header(RawContentDisposition(raw.to_string()))
        }
        Some(raw) => part.header(RawContentDisposition(format!(
            "{}; filename=\"{}\"",
            raw.trim_end_matches(';'),
            attachment.name
        ))),
        None => part.header(ContentDisposition::attachment(&attachment.name)),
    };

    if let Some(description) = attachment
        .description
        .as_deref()
        .filter(|description| !is_blank(description))
    {
        part = part.header(ContentDescription(description.to_string()));
    }

    Ok(part.body(attachment.payload.clone()))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use testresult::TestResult;
    use uuid::Uuid;

    use crate::domain::queue::{Body, NewMessage};

    use super::*;

    fn queued(message: NewMessage) -> Message {
        Message::queued(Uuid::now_v7(), &message, Utc::now())
    }

    fn plain() -> NewMessage {
        NewMessage::new("a@x.com", "Hi", Body::plain("plain text")).to("b@x.com")
    }

    fn formatted(message: &lettre::Message) -> String {
        String::from_utf8_lossy(&message.formatted()).into_owned()
    }

    #[test]
    fn test_plain_message_without_attachments_is_single_part() -> TestResult {
        let composed = compose(&queued(plain()))?;
        let raw = formatted(&composed);

        assert!(!raw.contains("multipart"));
        assert!(raw.contains("text/plain"));
        assert!(raw.contains("plain text"));
        assert_eq!(raw.matches("Content-Type:").count(), 1);

        Ok(())
    }

    #[test]
    fn test_attachment_makes_message_multipart() -> TestResult {
        let message = plain().attach(Attachment::new(
            "att.txt",
            "text/plain",
            b"A plain text file".to_vec(),
        ));

        let composed = compose(&queued(message))?;
        let raw = formatted(&composed);

        assert!(raw.contains("multipart/mixed"));
        assert_eq!(raw.matches("Content-Type:").count(), 3);

        let body_at = raw.find("plain text").ok_or("body missing")?;
        let attachment_at = raw.find("att.txt").ok_or("attachment missing")?;

        assert!(body_at < attachment_at);

        Ok(())
    }

    #[test]
    fn test_html_body_is_multipart() -> TestResult {
        let message = NewMessage::new("a@x.com", "Hi", Body::html("<p>hello</p>")).to("b@x.com");

        let composed = compose(&queued(message))?;
        let raw = formatted(&composed);

        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("text/html"));

        Ok(())
    }

    #[test]
    fn test_attachment_headers_are_passed_through() -> TestResult {
        let message = plain().attach(
            Attachment::new("att.txt", "text/plain", b"A plain text file".to_vec())
                .with_description("A sample properties file")
                .with_disposition("inline"),
        );

        let raw = formatted(&compose(&queued(message))?);

        assert!(raw.contains("Content-Description: A sample properties file"));
        assert!(raw.contains("Content-Disposition: inline; filename=\"att.txt\""));

        Ok(())
    }

    #[test]
    fn test_recipient_classes() -> TestResult {
        let message = plain().cc("c@x.com").bcc("d@x.com");

        let composed = compose(&queued(message))?;
        let recipients: Vec<String> = composed
            .envelope()
            .to()
            .iter()
            .map(ToString::to_string)
            .collect();

        assert_eq!(recipients, vec!["b@x.com", "c@x.com", "d@x.com"]);
        assert!(formatted(&composed).contains("Cc: c@x.com"));

        Ok(())
    }

    #[test]
    fn test_blank_subject_is_skipped() {
        let mut message = queued(plain());
        message.subject = " ".to_string();

        let result = compose(&message);

        assert!(matches!(result, Err(ComposeError::MissingSubject)));
        assert!(result.unwrap_err().is_skip());
    }

    #[test]
    fn test_blank_sender_is_skipped() {
        let mut message = queued(plain());
        message.sender = String::new();

        assert!(matches!(compose(&message), Err(ComposeError::MissingSender)));
    }

    #[test]
    fn test_invalid_recipient_is_an_error() {
        let message = queued(plain().to("not an address"));

        let result = compose(&message);

        assert!(matches!(result, Err(ComposeError::InvalidAddress { .. })));
        assert!(!result.unwrap_err().is_skip());
    }

    #[test]
    fn test_invalid_content_type_is_an_error() {
        let message = queued(plain().attach(Attachment::new("att.bin", "nonsense", vec![1, 2])));

        assert!(matches!(
            compose(&message),
            Err(ComposeError::InvalidContentType(_))
        ));
    }
}
