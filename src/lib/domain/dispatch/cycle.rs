//! The dispatch cycle: drain pending messages through one relay session

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::domain::{
    dispatch::{compose, errors::DispatchError, Transport, TransportSession},
    queue::{Message, MessageQuery, MessageStatus, MessageStore},
};

/// Counters for one completed cycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// Messages fetched from the store
    pub selected: usize,

    /// Messages accepted by the relay and marked as sent
    pub sent: usize,

    /// Messages parked because they can't be composed
    pub skipped: usize,

    /// Messages that failed to compose or deliver and stay queued for the next cycle
    pub failed: usize,
}

/// How a cycle ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing was pending, so no session was opened
    Idle,

    /// The batch was processed
    Completed(CycleSummary),

    /// The cycle stopped early. The cause has been logged.
    Aborted,
}

/// One bounded unit of delivery work.
///
/// At most one cycle runs at a time per [`DispatchCycle`] value and its clones; a second
/// caller waits for the first to finish rather than skipping.
#[derive(Debug)]
pub struct DispatchCycle<S, T>
where
    S: MessageStore,
    T: Transport,
{
    store: Arc<S>,
    transport: Arc<T>,
    permit: Arc<Semaphore>,
}

impl<S, T> Clone for DispatchCycle<S, T>
where
    S: MessageStore,
    T: Transport,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            transport: Arc::clone(&self.transport),
            permit: Arc::clone(&self.permit),
        }
    }
}

impl<S, T> DispatchCycle<S, T>
where
    S: MessageStore,
    T: Transport,
{
    /// Create a new dispatch cycle
    pub fn new(store: Arc<S>, transport: Arc<T>) -> Self {
        Self {
            store,
            transport,
            permit: Arc::new(Semaphore::new(1)),
        }
    }

    /// Run one cycle.
    ///
    /// Failures are logged here and reported only through the returned [`CycleOutcome`];
    /// whatever wasn't delivered stays queued for the next cycle.
    pub async fn run(&self) -> CycleOutcome {
        match self.execute().await {
            Ok(outcome) => outcome,
            Err(DispatchError::LockUnavailable) => {
                warn!("Could not acquire the dispatch lock");
                CycleOutcome::Aborted
            }
            Err(err) => {
                error!("Error sending pending messages: {:?}", err);
                CycleOutcome::Aborted
            }
        }
    }

    async fn execute(&self) -> Result<CycleOutcome, DispatchError> {
        let _permit = self
            .permit
            .acquire()
            .await
            .map_err(|_| DispatchError::LockUnavailable)?;

        let pending = MessageQuery::with_status(MessageStatus::NotSent);

        let count = self.store.count_messages(&pending).await?;

        if count <= 0 {
            debug!("No pending messages");
            return Ok(CycleOutcome::Idle);
        }

        let messages = self.store.find_messages(&pending.page(0, count)).await?;

        if messages.is_empty() {
            debug!("Pending messages disappeared before they could be fetched");
            return Ok(CycleOutcome::Idle);
        }

        info!("Number of messages attempting to send {}", messages.len());

        let mut summary = CycleSummary {
            selected: messages.len(),
            ..CycleSummary::default()
        };

        debug!("Connecting to SMTP server");

        let mut session = self.transport.open().await?;

        let mut successful = Vec::new();

        for mut message in messages {
            match Self::deliver(&mut session, &message).await {
                Delivery::Sent => {
                    message.mark_sent();
                    successful.push(message);
                }
                Delivery::Skipped => summary.skipped += 1,
                Delivery::Failed => summary.failed += 1,
            }
        }

        debug!("Closing session with SMTP server");

        session.close().await;

        summary.sent = successful.len();

        if !successful.is_empty() {
            info!("Number of messages sent {}", successful.len());

            self.store.update_messages(&successful).await?;
        }

        Ok(CycleOutcome::Completed(summary))
    }

    async fn deliver(session: &mut T::Session, message: &Message) -> Delivery {
        debug!(
            "Attempting to send {} {:?} from {:?} to {:?} cc {:?} bcc {:?} with {} attachment(s)",
            message.id,
            message.subject,
            message.sender,
            message.to,
            message.cc,
            message.bcc,
            message.attachments.len()
        );

        let composed = match compose(message) {
            Ok(composed) => composed,
            Err(err) if err.is_skip() => {
                warn!(
                    "Invalid message without either sender or subject, thus ignoring it {}: {}",
                    message.id, err
                );
                return Delivery::Skipped;
            }
            Err(err) => {
                warn!(
                    "Error composing message {} with subject {:?}: {}",
                    message.id, message.subject, err
                );
                return Delivery::Failed;
            }
        };

        match session.send(&composed).await {
            Ok(()) => {
                debug!("Sent {}", message.id);
                Delivery::Sent
            }
            Err(err) => {
                warn!(
                    "Error sending message {} with subject {:?}: {}",
                    message.id, message.subject, err
                );
                Delivery::Failed
            }
        }
    }
}

enum Delivery {
    Sent,
    Skipped,
    Failed,
}
