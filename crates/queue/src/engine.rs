//! Wires the primary consumer and the retry worker pool together.

use std::sync::Arc;
use std::time::Duration;

use eventrelay_common::DeliveryConfig;
use tokio::task::JoinHandle;
use tracing::info;

use crate::clock::Clock;
use crate::escalation::EscalationSink;
use crate::fanout::Fanout;
use crate::retry::RetryConfig;
use crate::scheduler::RetryScheduler;
use crate::store::{EventQueue, RetrySchedule};
use crate::workers::{PrimaryConsumer, RetryWorkerPool};

/// Runtime settings of the delivery engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Retry ceiling and backoff base.
    pub retry: RetryConfig,
    /// Number of retry workers.
    pub retry_workers: usize,
    /// Pause after an empty poll or a store error.
    pub poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            retry_workers: 5,
            poll_interval: Duration::from_secs(5),
        }
    }
}

impl From<&DeliveryConfig> for EngineConfig {
    fn from(config: &DeliveryConfig) -> Self {
        Self {
            retry: RetryConfig::from(config),
            retry_workers: config.retry_workers,
            poll_interval: config.poll_interval(),
        }
    }
}

/// The delivery engine: one primary consumer plus a pool of retry workers
/// sharing a fanout and a retry scheduler.
#[derive(Clone)]
pub struct DeliveryEngine {
    consumer: PrimaryConsumer,
    pool: RetryWorkerPool,
}

impl DeliveryEngine {
    /// Build the engine over shared store handles.
    #[must_use]
    pub fn new(
        queue: Arc<dyn EventQueue>,
        schedule: Arc<dyn RetrySchedule>,
        fanout: Fanout,
        escalation: Arc<dyn EscalationSink>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let scheduler = RetryScheduler::new(schedule, escalation, clock, config.retry);
        let consumer = PrimaryConsumer::new(
            queue,
            fanout.clone(),
            scheduler.clone(),
            config.poll_interval,
        );
        let pool = RetryWorkerPool::new(
            config.retry_workers,
            fanout,
            scheduler,
            config.poll_interval,
        );

        Self { consumer, pool }
    }

    /// Spawn the consumer and every retry worker.
    #[must_use]
    pub fn start(&self) -> EngineHandle {
        let consumer = self.consumer.clone();
        let mut tasks = vec![tokio::spawn(consumer.run())];
        tasks.extend(self.pool.spawn());

        info!(
            retry_workers = self.pool.worker_count(),
            "Delivery engine started"
        );
        EngineHandle { tasks }
    }
}

/// Running engine tasks.
#[derive(Debug)]
pub struct EngineHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl EngineHandle {
    /// Number of running tasks, consumer included.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Stop every task. In-flight attempts are abandoned; an abandoned retry
    /// was already claimed and is not redelivered.
    pub fn abort(self) {
        for task in self.tasks {
            task.abort();
        }
        info!("Delivery engine stopped");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::clock::ManualClock;
    use crate::destination::Destination;
    use crate::escalation::LogEscalation;
    use crate::jobs::{Event, RetryEnvelope};
    use crate::store::MemoryStore;

    struct Counting(Arc<AtomicUsize>);

    #[async_trait]
    impl Destination for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        async fn send(&self, _event: &Event) -> bool {
            self.0.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_resumes_after_store_outage() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        let calls = Arc::new(AtomicUsize::new(0));

        let engine = DeliveryEngine::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Fanout::new(vec![Arc::new(Counting(calls.clone())) as Arc<dyn Destination>]),
            Arc::new(LogEscalation),
            Arc::new(ManualClock::at(1_000)),
            EngineConfig::default(),
        );
        let handle = engine.start();
        assert_eq!(handle.task_count(), 6);

        // Every loop hits the outage and backs off for the 5 s poll interval.
        tokio::time::sleep(Duration::from_secs(1)).await;
        store.set_unavailable(false);
        store.push("garbage".to_string()).await.unwrap();
        for user in ["u1", "u2"] {
            store
                .push(Event::new(user, "p").to_json().unwrap())
                .await
                .unwrap();
        }
        let due = RetryEnvelope::with_retry_count(Event::new("u3", "p"), 1);
        store
            .add_with_priority(1_000, due.to_json().unwrap())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.len().await.unwrap(), 3);

        // One backoff later the consumer drains the malformed entry and both
        // events back to back, and a worker takes the due retry.
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(store.len().await.unwrap(), 0);
        assert!(store.scheduled().await.is_empty());

        handle.abort();
    }

    #[test]
    fn test_engine_config_from_delivery_config() {
        let delivery = DeliveryConfig {
            max_retries: 3,
            retry_workers: 2,
            poll_interval_secs: 1,
            ..Default::default()
        };
        let config = EngineConfig::from(&delivery);

        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry_workers, 2);
        assert_eq!(config.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_default_engine_config() {
        let config = EngineConfig::default();
        assert_eq!(config.retry_workers, 5);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config, EngineConfig::from(&DeliveryConfig::default()));
    }
}
