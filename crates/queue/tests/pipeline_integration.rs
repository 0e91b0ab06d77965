//! End-to-end pipeline tests against the in-memory store.
//!
//! Time is driven by a manual clock, and workers are stepped one iteration at
//! a time, so every scenario is deterministic.

#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use eventrelay_queue::{
    Clock, DeliveryOutcome, Destination, EscalationError, EscalationSink, Event, EventQueue,
    Fanout, ManualClock, MemoryStore, PrimaryConsumer, RetryConfig, RetryEnvelope, RetrySchedule,
    RetryScheduler, RetryWorker,
};
use tokio::sync::Barrier;

const START: i64 = 1_700_000_000;

/// Destination whose verdict can be flipped mid-test.
struct Switch {
    accept: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Destination for Switch {
    fn name(&self) -> &str {
        "switch"
    }

    async fn send(&self, _event: &Event) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.accept.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct RecordingSink {
    messages: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl EscalationSink for RecordingSink {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), EscalationError> {
        self.messages
            .lock()
            .unwrap()
            .push((subject.to_string(), body.to_string()));
        Ok(())
    }
}

struct Pipeline {
    store: MemoryStore,
    clock: ManualClock,
    accept: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
    sink: Arc<RecordingSink>,
    scheduler: RetryScheduler,
    consumer: PrimaryConsumer,
    worker: RetryWorker,
}

impl Pipeline {
    fn new(accept: bool) -> Self {
        let store = MemoryStore::new();
        let clock = ManualClock::at(START);
        let accept = Arc::new(AtomicBool::new(accept));
        let calls = Arc::new(AtomicUsize::new(0));
        let sink = Arc::new(RecordingSink::default());

        let fanout = Fanout::new(vec![Arc::new(Switch {
            accept: accept.clone(),
            calls: calls.clone(),
        }) as Arc<dyn Destination>]);
        let scheduler = RetryScheduler::new(
            Arc::new(store.clone()),
            sink.clone(),
            Arc::new(clock.clone()),
            RetryConfig::default(),
        );
        let consumer = PrimaryConsumer::new(
            Arc::new(store.clone()),
            fanout.clone(),
            scheduler.clone(),
            Duration::from_secs(5),
        );
        let worker = RetryWorker::new(0, fanout, scheduler.clone(), Duration::from_secs(5));

        Self {
            store,
            clock,
            accept,
            calls,
            sink,
            scheduler,
            consumer,
            worker,
        }
    }

    async fn ingest(&self, user_id: &str, payload: &str) {
        self.store
            .push(Event::new(user_id, payload).to_json().unwrap())
            .await
            .unwrap();
    }

    fn escalations(&self) -> Vec<(String, String)> {
        self.sink.messages.lock().unwrap().clone()
    }
}

#[tokio::test]
async fn test_successful_delivery_leaves_queue_and_schedule_empty() {
    let pipeline = Pipeline::new(true);
    pipeline.ingest("u1", "p1").await;

    assert_eq!(pipeline.consumer.consume_next().await, DeliveryOutcome::Delivered);

    assert!(pipeline.store.is_empty().await.unwrap());
    assert_eq!(pipeline.store.count().await.unwrap(), 0);
    assert!(pipeline.escalations().is_empty());
}

#[tokio::test]
async fn test_failed_delivery_is_retried_once_due() {
    let pipeline = Pipeline::new(false);
    pipeline.ingest("u1", "p1").await;

    assert_eq!(pipeline.consumer.consume_next().await, DeliveryOutcome::Rescheduled);

    let scheduled = pipeline.store.scheduled().await;
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0].0, START + 2);
    let envelope = RetryEnvelope::from_json(&scheduled[0].1).unwrap();
    assert_eq!(envelope.retry_count, 1);
    assert_eq!(envelope.event, Event::new("u1", "p1"));

    // Not due yet.
    pipeline.clock.advance(Duration::from_secs(1));
    assert_eq!(pipeline.worker.process_next().await, DeliveryOutcome::Idle);

    pipeline.accept.store(true, Ordering::SeqCst);
    pipeline.clock.advance(Duration::from_secs(1));
    assert_eq!(pipeline.worker.process_next().await, DeliveryOutcome::Delivered);

    assert_eq!(pipeline.store.count().await.unwrap(), 0);
    assert_eq!(pipeline.calls.load(Ordering::SeqCst), 2);
    assert!(pipeline.escalations().is_empty());
}

#[tokio::test]
async fn test_always_failing_event_escalates_once() {
    let pipeline = Pipeline::new(false);
    pipeline.ingest("u1", "p1").await;

    assert_eq!(pipeline.consumer.consume_next().await, DeliveryOutcome::Rescheduled);

    let mut outcomes = Vec::new();
    let mut delays = Vec::new();
    loop {
        let Some((due_at, _)) = pipeline.store.scheduled().await.first().cloned() else {
            break;
        };
        delays.push(due_at - pipeline.clock.unix_timestamp());
        pipeline.clock.set(due_at);
        outcomes.push(pipeline.worker.process_next().await);
    }

    assert_eq!(delays, vec![2, 4, 8, 16, 32]);
    assert_eq!(
        outcomes,
        vec![
            DeliveryOutcome::Rescheduled,
            DeliveryOutcome::Rescheduled,
            DeliveryOutcome::Rescheduled,
            DeliveryOutcome::Rescheduled,
            DeliveryOutcome::Escalated,
        ]
    );
    assert_eq!(pipeline.store.count().await.unwrap(), 0);
    assert_eq!(pipeline.calls.load(Ordering::SeqCst), 6);

    let escalations = pipeline.escalations();
    assert_eq!(escalations.len(), 1);
    assert_eq!(escalations[0].0, "Event Delivery Failed");
    assert!(escalations[0].1.contains("after 5 attempts"));
    assert!(escalations[0].1.contains("p1"));
}

#[tokio::test]
async fn test_store_outage_during_poll_keeps_entry() {
    let pipeline = Pipeline::new(false);
    pipeline.ingest("u1", "p1").await;
    pipeline.consumer.consume_next().await;
    pipeline.clock.advance(Duration::from_secs(2));

    pipeline.store.set_unavailable(true);
    assert_eq!(pipeline.worker.process_next().await, DeliveryOutcome::StoreError);

    pipeline.store.set_unavailable(false);
    assert_eq!(pipeline.store.count().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_pollers_claim_entry_once() {
    let pipeline = Pipeline::new(false);
    let envelope = RetryEnvelope::with_retry_count(Event::new("u1", "p1"), 1);
    pipeline
        .store
        .add_with_priority(START, envelope.to_json().unwrap())
        .await
        .unwrap();

    let pollers = 8;
    let barrier = Arc::new(Barrier::new(pollers));
    let handles: Vec<_> = (0..pollers)
        .map(|_| {
            let scheduler = pipeline.scheduler.clone();
            let barrier = barrier.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                scheduler.poll_due(1).await.unwrap()
            })
        })
        .collect();

    let mut claimed = Vec::new();
    for handle in handles {
        claimed.extend(handle.await.unwrap());
    }

    assert_eq!(claimed.len(), 1);
    assert_eq!(RetryEnvelope::from_json(&claimed[0]).unwrap(), envelope);
    assert_eq!(pipeline.store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_events_for_different_users_are_independent() {
    let pipeline = Pipeline::new(false);
    pipeline.ingest("u1", "p1").await;
    pipeline.ingest("u2", "p2").await;

    pipeline.consumer.consume_next().await;
    pipeline.accept.store(true, Ordering::SeqCst);
    pipeline.consumer.consume_next().await;

    let scheduled = pipeline.store.scheduled().await;
    assert_eq!(scheduled.len(), 1);
    assert_eq!(
        RetryEnvelope::from_json(&scheduled[0].1).unwrap().event.user_id,
        "u1"
    );
}
