//! Redis integration tests.
//!
//! These tests require a running Redis instance.
//! Run with: `cargo test --test redis_integration -- --ignored`
//!
//! Set `REDIS_URL` environment variable to point to your Redis instance.
//! Default: <redis://localhost:6379>

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use eventrelay_queue::{Event, EventQueue, RedisStore, RetryEnvelope, RetrySchedule};

fn get_redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

/// Connect with keys unique to one test so tests can run side by side.
async fn connect(test: &str) -> RedisStore {
    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    RedisStore::connect(
        &get_redis_url(),
        format!("eventrelay-test:{test}:{nonce}:events"),
        format!("eventrelay-test:{test}:{nonce}:retry_events"),
    )
    .await
    .unwrap()
}

/// Test that we can connect to Redis.
#[tokio::test]
#[ignore = "requires running Redis instance"]
async fn test_redis_connection() {
    let store = connect("connection").await;
    assert_eq!(store.check().await.unwrap(), (0, 0));
    store.quit().await.unwrap();
}

/// Test FIFO order of the ingestion list.
#[tokio::test]
#[ignore = "requires running Redis instance"]
async fn test_queue_push_and_blocking_pop() {
    let store = connect("queue").await;

    let first = Event::new("u1", "p1").to_json().unwrap();
    let second = Event::new("u2", "p2").to_json().unwrap();
    store.push(first.clone()).await.unwrap();
    store.push(second.clone()).await.unwrap();
    assert_eq!(store.len().await.unwrap(), 2);

    assert_eq!(store.blocking_pop().await.unwrap(), first);
    assert_eq!(store.blocking_pop().await.unwrap(), second);
    assert_eq!(store.len().await.unwrap(), 0);

    store.quit().await.unwrap();
}

/// Test that a blocking pop waits for a later push.
#[tokio::test]
#[ignore = "requires running Redis instance"]
async fn test_blocking_pop_waits() {
    let store = connect("blocking").await;

    let consumer = {
        let store = store.clone();
        tokio::spawn(async move { store.blocking_pop().await })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!consumer.is_finished());

    // The shared client keeps working while the blocking client waits.
    assert_eq!(store.count().await.unwrap(), 0);

    store.push("late".to_string()).await.unwrap();
    let popped = tokio::time::timeout(Duration::from_secs(5), consumer)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(popped, "late");

    store.quit().await.unwrap();
}

/// Test claim order and that future entries stay on the schedule.
#[tokio::test]
#[ignore = "requires running Redis instance"]
async fn test_schedule_claims_due_entries_in_order() {
    let store = connect("schedule").await;

    for (priority, count) in [(30, 3), (10, 1), (20, 2)] {
        let envelope = RetryEnvelope::with_retry_count(Event::new("u1", "p1"), count);
        store
            .add_with_priority(priority, envelope.to_json().unwrap())
            .await
            .unwrap();
    }
    assert_eq!(store.count().await.unwrap(), 3);

    let claimed = store.pop_due_below(20, 10).await.unwrap();
    let counts: Vec<u32> = claimed
        .iter()
        .map(|raw| RetryEnvelope::from_json(raw).unwrap().retry_count)
        .collect();
    assert_eq!(counts, vec![1, 2]);
    assert_eq!(store.count().await.unwrap(), 1);

    assert!(store.pop_due_below(29, 10).await.unwrap().is_empty());
    assert_eq!(store.pop_due_below(30, 1).await.unwrap().len(), 1);

    store.quit().await.unwrap();
}

/// Test that concurrent claimers never share an entry.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires running Redis instance"]
async fn test_concurrent_claims_are_exclusive() {
    let store = Arc::new(connect("concurrent").await);

    for i in 0..20 {
        store
            .add_with_priority(i, format!("entry-{i}"))
            .await
            .unwrap();
    }

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move {
                let mut claimed = Vec::new();
                loop {
                    let batch = store.pop_due_below(100, 1).await.unwrap();
                    if batch.is_empty() {
                        break;
                    }
                    claimed.extend(batch);
                }
                claimed
            })
        })
        .collect();

    let mut claimed = Vec::new();
    for handle in handles {
        claimed.extend(handle.await.unwrap());
    }
    assert_eq!(claimed.len(), 20);
    claimed.sort();
    claimed.dedup();
    assert_eq!(claimed.len(), 20);
    assert_eq!(store.count().await.unwrap(), 0);

    store.quit().await.unwrap();
}
