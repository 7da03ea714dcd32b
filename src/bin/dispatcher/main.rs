#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::missing_crate_level_docs
)]

//! Background dispatcher draining the email queue to the SMTP relay

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use emailq::{
    domain::dispatch::{CycleScheduler, DispatchCycle, SchedulerConfig},
    infrastructure::{
        database::postgres::{DatabaseConnectionDetails, PostgresDatabase},
        email::smtp::{SmtpConfig, SmtpRelay},
    },
};
use tokio::signal;
use tracing::{debug, info};

/// Command-line arguments / environment variables
#[derive(Debug, Parser)]
pub struct Args {
    /// The database connection details
    #[clap(flatten)]
    pub db: DatabaseConnectionDetails,

    /// The SMTP relay configuration
    #[clap(flatten)]
    pub smtp: SmtpConfig,

    /// The dispatch schedule
    #[clap(flatten)]
    pub scheduler: SchedulerConfig,
}

#[mutants::skip]
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let postgres = Arc::new(PostgresDatabase::new(&args.db.connection_string).await?);

    postgres.migrate().await?;

    let cycle = DispatchCycle::new(postgres, Arc::new(SmtpRelay::new(args.smtp)));

    let mut scheduler = CycleScheduler::new(args.scheduler);

    scheduler.start(move || {
        let cycle = cycle.clone();
        async move {
            let outcome = cycle.run().await;
            debug!("Dispatch cycle finished: {:?}", outcome);
        }
    });

    shutdown_signal().await;

    info!("Shutting down");

    scheduler.stop().await;

    Ok(())
}

#[mutants::skip]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
