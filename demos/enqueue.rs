use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use emailq::{
    domain::queue::{
        Attachment, Body, MessageQuery, MessageStatus, NewMessage, QueueService, QueueServiceImpl,
    },
    infrastructure::database::postgres::{DatabaseConnectionDetails, PostgresDatabase},
};

#[derive(Parser)]
pub struct Args {
    #[clap(flatten)]
    pub db: DatabaseConnectionDetails,

    /// Recipient of the sample message
    #[clap(long, default_value = "b@example.com")]
    pub to: String,
}

#[tokio::main]
pub async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let database = PostgresDatabase::new(&args.db.connection_string).await?;

    database.migrate().await?;

    let queue = QueueServiceImpl::new(Arc::new(database));

    let message = NewMessage::new("a@example.com", "Test Subject", Body::plain("Test Message Body"))
        .to(args.to)
        .attach(
            Attachment::new("att.txt", "text/plain", b"A plain text file".to_vec())
                .with_description("A sample text file"),
        );

    let id = queue.save_message(&message).await?;

    println!("Queued message {}", id);

    let pending = queue
        .query_messages(&MessageQuery::with_status(MessageStatus::NotSent).page(0, 10))
        .await?;

    println!("{}", serde_json::to_string_pretty(&pending)?);

    Ok(())
}
