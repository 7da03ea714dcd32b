use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use emailq::{
    domain::{
        dispatch::{
            errors::TransportError, CycleOutcome, CycleSummary, DispatchCycle, Transport,
            TransportSession,
        },
        queue::{
            errors::{QueryMessagesError, SaveMessageError, UpdateMessagesError},
            Body, Message, MessageId, MessageQuery, MessageStatus, MessageStore, NewMessage,
            QueueService, QueueServiceImpl,
        },
    },
    infrastructure::database::memory::InMemoryMessageStore,
};
use testresult::TestResult;

/// Shared view of what the relay saw
#[derive(Debug, Default)]
struct Relay {
    session_open: AtomicBool,
    open_sessions: AtomicUsize,
    max_open_sessions: AtomicUsize,
    closed: AtomicUsize,
    delivered: Mutex<Vec<lettre::Message>>,
}

#[derive(Debug, Clone, Default)]
struct RecordingTransport {
    relay: Arc<Relay>,
    delay: Duration,
}

struct RecordingSession {
    relay: Arc<Relay>,
    delay: Duration,
}

#[async_trait]
impl Transport for RecordingTransport {
    type Session = RecordingSession;

    async fn open(&self) -> Result<RecordingSession, TransportError> {
        let open = self.relay.open_sessions.fetch_add(1, Ordering::SeqCst) + 1;
        self.relay.max_open_sessions.fetch_max(open, Ordering::SeqCst);
        self.relay.session_open.store(true, Ordering::SeqCst);

        Ok(RecordingSession {
            relay: self.relay.clone(),
            delay: self.delay,
        })
    }
}

#[async_trait]
impl TransportSession for RecordingSession {
    async fn send(&mut self, message: &lettre::Message) -> Result<(), TransportError> {
        tokio::time::sleep(self.delay).await;

        self.relay
            .delivered
            .lock()
            .expect("relay lock poisoned")
            .push(message.clone());

        Ok(())
    }

    async fn close(&mut self) {
        self.relay.closed.fetch_add(1, Ordering::SeqCst);
        self.relay.open_sessions.fetch_sub(1, Ordering::SeqCst);
        self.relay.session_open.store(false, Ordering::SeqCst);
    }
}

/// Wraps the in-memory store to observe how the cycle uses it
#[derive(Debug, Clone)]
struct ObservedStore {
    inner: InMemoryMessageStore,
    relay: Arc<Relay>,
    updates: Arc<Mutex<Vec<Vec<MessageId>>>>,
    fetches_during_session: Arc<AtomicUsize>,
}

impl ObservedStore {
    fn new(relay: Arc<Relay>) -> Self {
        Self {
            inner: InMemoryMessageStore::new(),
            relay,
            updates: Arc::default(),
            fetches_during_session: Arc::default(),
        }
    }

    fn updates(&self) -> Vec<Vec<MessageId>> {
        self.updates.lock().expect("updates lock poisoned").clone()
    }
}

#[async_trait]
impl MessageStore for ObservedStore {
    async fn insert_message(&self, message: &NewMessage) -> Result<MessageId, SaveMessageError> {
        self.inner.insert_message(message).await
    }

    async fn count_messages(&self, query: &MessageQuery) -> Result<i64, QueryMessagesError> {
        self.inner.count_messages(query).await
    }

    async fn find_messages(&self, query: &MessageQuery) -> Result<Vec<Message>, QueryMessagesError> {
        if self.relay.session_open.load(Ordering::SeqCst) {
            self.fetches_during_session.fetch_add(1, Ordering::SeqCst);
        }

        self.inner.find_messages(query).await
    }

    async fn update_messages(&self, messages: &[Message]) -> Result<(), UpdateMessagesError> {
        self.updates
            .lock()
            .expect("updates lock poisoned")
            .push(messages.iter().map(|message| message.id).collect());

        self.inner.update_messages(messages).await
    }
}

struct Harness {
    relay: Arc<Relay>,
    store: Arc<ObservedStore>,
    queue: QueueServiceImpl<ObservedStore>,
    cycle: DispatchCycle<ObservedStore, RecordingTransport>,
}

fn harness(delay: Duration) -> Harness {
    let relay = Arc::new(Relay::default());
    let store = Arc::new(ObservedStore::new(relay.clone()));
    let transport = RecordingTransport {
        relay: relay.clone(),
        delay,
    };

    Harness {
        queue: QueueServiceImpl::new(store.clone()),
        cycle: DispatchCycle::new(store.clone(), Arc::new(transport)),
        relay,
        store,
    }
}

fn hello() -> NewMessage {
    NewMessage::new("a@x.com", "Hi", Body::plain("plain text")).to("b@x.com")
}

fn delivered(relay: &Relay) -> usize {
    relay.delivered.lock().expect("relay lock poisoned").len()
}

#[tokio::test]
async fn test_saved_message_is_delivered_and_marked_sent() -> TestResult {
    let harness = harness(Duration::ZERO);

    let id = harness.queue.save_message(&hello()).await?;

    let queued = harness.store.inner.get(&id).await.ok_or("message missing")?;
    assert_eq!(queued.status, MessageStatus::NotSent);

    let outcome = harness.cycle.run().await;

    assert_eq!(
        outcome,
        CycleOutcome::Completed(CycleSummary {
            selected: 1,
            sent: 1,
            skipped: 0,
            failed: 0,
        })
    );

    let sent = harness.store.inner.get(&id).await.ok_or("message missing")?;
    assert_eq!(sent.status, MessageStatus::Sent);
    assert_eq!(harness.store.updates(), vec![vec![id]]);

    let delivered = harness.relay.delivered.lock().expect("relay lock poisoned");
    let recipients: Vec<String> = delivered[0]
        .envelope()
        .to()
        .iter()
        .map(ToString::to_string)
        .collect();

    assert_eq!(recipients, vec!["b@x.com"]);
    assert_eq!(harness.relay.closed.load(Ordering::SeqCst), 1);

    Ok(())
}

#[tokio::test]
async fn test_second_run_sends_no_duplicates() -> TestResult {
    let harness = harness(Duration::ZERO);

    harness.queue.save_message(&hello()).await?;

    harness.cycle.run().await;
    let second = harness.cycle.run().await;

    assert_eq!(second, CycleOutcome::Idle);
    assert_eq!(delivered(&harness.relay), 1);
    assert_eq!(harness.store.updates().len(), 1);
    assert_eq!(harness.relay.closed.load(Ordering::SeqCst), 1);

    Ok(())
}

#[tokio::test]
async fn test_rejected_message_is_never_stored() {
    let harness = harness(Duration::ZERO);

    let no_recipients = NewMessage::new("a@x.com", "Hi", Body::plain("plain text"));

    let result = harness.queue.save_message(&no_recipients).await;

    assert!(matches!(result, Err(SaveMessageError::NoRecipients)));
    assert!(harness.store.inner.snapshot().await.is_empty());
    assert_eq!(harness.cycle.run().await, CycleOutcome::Idle);
}

#[tokio::test]
async fn test_malformed_message_stays_queued() -> TestResult {
    let harness = harness(Duration::ZERO);

    let first = harness.queue.save_message(&hello()).await?;
    let blank = harness
        .queue
        .save_message(&NewMessage::new("a@x.com", "", Body::plain("plain text")).to("b@x.com"))
        .await?;
    let third = harness.queue.save_message(&hello().cc("c@x.com")).await?;

    let outcome = harness.cycle.run().await;

    assert!(matches!(
        outcome,
        CycleOutcome::Completed(CycleSummary { sent: 2, skipped: 1, .. })
    ));

    let page = harness
        .queue
        .query_messages(&MessageQuery::with_status(MessageStatus::NotSent))
        .await?;

    assert_eq!(page.total_count, 1);
    assert_eq!(page.items[0].id, blank);
    assert_eq!(harness.store.updates(), vec![vec![first, third]]);

    Ok(())
}

#[tokio::test]
async fn test_concurrent_runs_never_overlap() -> TestResult {
    let harness = harness(Duration::from_millis(20));

    for _ in 0..3 {
        harness.queue.save_message(&hello()).await?;
    }

    let other = harness.cycle.clone();

    let (first, second) = tokio::join!(harness.cycle.run(), other.run());

    let outcomes = [first, second];

    assert_eq!(
        outcomes
            .iter()
            .filter(|outcome| matches!(outcome, CycleOutcome::Completed(_)))
            .count(),
        1
    );
    assert!(outcomes.contains(&CycleOutcome::Idle));

    assert_eq!(harness.relay.max_open_sessions.load(Ordering::SeqCst), 1);
    assert_eq!(harness.store.fetches_during_session.load(Ordering::SeqCst), 0);
    assert_eq!(delivered(&harness.relay), 3);

    Ok(())
}
