//! Postgres implementation of the MessageStore trait

use std::collections::HashMap;

use anyhow::{anyhow, Error};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{query, query_as, FromRow};
use uuid::Uuid;

use crate::{
    domain::queue::{
        errors::{QueryMessagesError, SaveMessageError, UpdateMessagesError},
        Attachment, Body, BodyKind, Message, MessageId, MessageQuery, MessageStatus, MessageStore,
        NewMessage,
    },
    infrastructure::database::postgres::PostgresDatabase,
};

#[derive(FromRow)]
struct MessageRecord {
    id: Uuid,
    sender: String,
    recipients_to: Vec<String>,
    recipients_cc: Vec<String>,
    recipients_bcc: Vec<String>,
    subject: String,
    body_kind: String,
    body_text: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRecord> for Message {
    type Error = Error;

    fn try_from(record: MessageRecord) -> Result<Self, Self::Error> {
        Ok(Message {
            id: record.id,
            sender: record.sender,
            to: record.recipients_to,
            cc: record.recipients_cc,
            bcc: record.recipients_bcc,
            subject: record.subject,
            body: Body {
                kind: BodyKind::from(record.body_kind.as_str()),
                text: record.body_text,
            },
            attachments: Vec::new(),
            status: MessageStatus::try_from(record.status.as_str())?,
            created_at: record.created_at,
        })
    }
}

#[derive(FromRow)]
struct AttachmentRecord {
    message_id: Uuid,
    name: String,
    content_type: String,
    description: Option<String>,
    disposition: Option<String>,
    payload: Vec<u8>,
}

impl From<AttachmentRecord> for Attachment {
    fn from(record: AttachmentRecord) -> Self {
        Attachment {
            name: record.name,
            content_type: record.content_type,
            description: record.description,
            disposition: record.disposition,
            payload: record.payload,
        }
    }
}

impl PostgresDatabase {
    #[mutants::skip]
    async fn attachments_for(
        &self,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<Attachment>>, sqlx::Error> {
        let records = query_as::<_, AttachmentRecord>(
            r#"
            SELECT message_id, name, content_type, description, disposition, payload
            FROM message_attachments
            WHERE message_id = ANY($1)
            ORDER BY message_id, position
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut attachments: HashMap<Uuid, Vec<Attachment>> = HashMap::new();

        for record in records {
            attachments
                .entry(record.message_id)
                .or_default()
                .push(record.into());
        }

        Ok(attachments)
    }
}

#[async_trait]
impl MessageStore for PostgresDatabase {
    #[mutants::skip]
    async fn insert_message(&self, message: &NewMessage) -> Result<MessageId, SaveMessageError> {
        let id = Uuid::now_v7();
        let mut tx = self.pool.begin().await?;

        query(
            r#"
            INSERT INTO messages (
                id,
                sender,
                recipients_to,
                recipients_cc,
                recipients_bcc,
                subject,
                body_kind,
                body_text,
                status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(id)
        .bind(&message.sender)
        .bind(&message.to)
        .bind(&message.cc)
        .bind(&message.bcc)
        .bind(&message.subject)
        .bind(message.body.kind.as_str())
        .bind(&message.body.text)
        .bind(MessageStatus::NotSent.as_str())
        .execute(&mut *tx)
        .await?;

        for (position, attachment) in message.attachments.iter().enumerate() {
            let position = i32::try_from(position)
                .map_err(|_| anyhow!("too many attachments on message {}", id))?;

            query(
                r#"
                INSERT INTO message_attachments (
                    message_id,
                    position,
                    name,
                    content_type,
                    description,
                    disposition,
                    payload
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(id)
            .bind(position)
            .bind(&attachment.name)
            .bind(&attachment.content_type)
            .bind(&attachment.description)
            .bind(&attachment.disposition)
            .bind(&attachment.payload)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(id)
    }

    #[mutants::skip]
    async fn count_messages(&self, filter: &MessageQuery) -> Result<i64, QueryMessagesError> {
        let (count,) = query_as::<_, (i64,)>(
            r#"
            SELECT COUNT(*)
            FROM messages
            WHERE ($1::TEXT IS NULL OR status = $1)
              AND ($2::TEXT IS NULL OR sender = $2)
            "#,
        )
        .bind(filter.status.map(|status| status.as_str()))
        .bind(filter.sender.as_deref())
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    #[mutants::skip]
    async fn find_messages(&self, filter: &MessageQuery) -> Result<Vec<Message>, QueryMessagesError> {
        let records = query_as::<_, MessageRecord>(
            r#"
            SELECT
                id,
                sender,
                recipients_to,
                recipients_cc,
                recipients_bcc,
                subject,
                body_kind,
                body_text,
                status,
                created_at
            FROM messages
            WHERE ($1::TEXT IS NULL OR status = $1)
              AND ($2::TEXT IS NULL OR sender = $2)
            ORDER BY created_at, id
            OFFSET $3
            LIMIT $4
            "#,
        )
        .bind(filter.status.map(|status| status.as_str()))
        .bind(filter.sender.as_deref())
        .bind(filter.offset)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = records.iter().map(|record| record.id).collect();
        let mut attachments = self.attachments_for(&ids).await?;

        records
            .into_iter()
            .map(|record| -> Result<Message, QueryMessagesError> {
                let mut message = Message::try_from(record)?;
                message.attachments = attachments.remove(&message.id).unwrap_or_default();
                Ok(message)
            })
            .collect()
    }

    #[mutants::skip]
    async fn update_messages(&self, messages: &[Message]) -> Result<(), UpdateMessagesError> {
        let mut tx = self.pool.begin().await?;

        for message in messages.iter().filter(|message| message.status.is_sent()) {
            query(
                r#"
                UPDATE messages
                SET status = $2,
                    updated_at = NOW()
                WHERE id = $1
                  AND status = $3
                "#,
            )
            .bind(message.id)
            .bind(MessageStatus::Sent.as_str())
            .bind(MessageStatus::NotSent.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(())
    }
}
