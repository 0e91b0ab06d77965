//! In-process queue and retry schedule.
//!
//! Mirrors the Redis semantics closely enough for tests and single-process
//! development runs: the schedule behaves like a sorted set (a payload is
//! unique, re-adding it moves its score, ties order by payload), and every
//! operation holds one lock for its whole duration.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use super::{EventQueue, RetrySchedule, StoreError};

#[derive(Debug, Default)]
struct ScheduleState {
    by_priority: BTreeSet<(i64, String)>,
    priorities: HashMap<String, i64>,
}

/// In-memory store implementing both [`EventQueue`] and [`RetrySchedule`].
///
/// Clones share state. [`MemoryStore::set_unavailable`] makes every operation
/// fail, which simulates a store outage.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    queue: Arc<Mutex<VecDeque<String>>>,
    queue_ready: Arc<Notify>,
    schedule: Arc<Mutex<ScheduleState>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle simulated outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
        if !unavailable {
            self.queue_ready.notify_waiters();
        }
    }

    /// Snapshot of the schedule as `(priority, payload)` pairs, earliest first.
    pub async fn scheduled(&self) -> Vec<(i64, String)> {
        self.schedule
            .lock()
            .await
            .by_priority
            .iter()
            .cloned()
            .collect()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store is offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl EventQueue for MemoryStore {
    async fn push(&self, item: String) -> Result<(), StoreError> {
        self.check_available()?;
        self.queue.lock().await.push_back(item);
        self.queue_ready.notify_one();
        Ok(())
    }

    async fn blocking_pop(&self) -> Result<String, StoreError> {
        loop {
            self.check_available()?;
            if let Some(item) = self.queue.lock().await.pop_front() {
                return Ok(item);
            }
            self.queue_ready.notified().await;
        }
    }

    async fn len(&self) -> Result<u64, StoreError> {
        self.check_available()?;
        Ok(self.queue.lock().await.len() as u64)
    }
}

#[async_trait]
impl RetrySchedule for MemoryStore {
    async fn add_with_priority(&self, priority: i64, payload: String) -> Result<(), StoreError> {
        self.check_available()?;
        let mut state = self.schedule.lock().await;

        if let Some(previous) = state.priorities.insert(payload.clone(), priority) {
            state.by_priority.remove(&(previous, payload.clone()));
        }
        state.by_priority.insert((priority, payload));
        Ok(())
    }

    async fn pop_due_below(
        &self,
        max_priority: i64,
        limit: usize,
    ) -> Result<Vec<String>, StoreError> {
        self.check_available()?;
        let mut state = self.schedule.lock().await;

        let due: Vec<(i64, String)> = state
            .by_priority
            .iter()
            .take_while(|(priority, _)| *priority <= max_priority)
            .take(limit)
            .cloned()
            .collect();

        for entry in &due {
            state.by_priority.remove(entry);
            state.priorities.remove(&entry.1);
        }

        Ok(due.into_iter().map(|(_, payload)| payload).collect())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        self.check_available()?;
        Ok(self.schedule.lock().await.by_priority.len() as u64)
    }
}
