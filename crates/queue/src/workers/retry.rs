//! Retry workers.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::DeliveryOutcome;
use crate::fanout::Fanout;
use crate::jobs::RetryEnvelope;
use crate::scheduler::{RetryScheduler, ScheduleOutcome};

/// Polls the due-schedule and redelivers claimed envelopes.
#[derive(Clone)]
pub struct RetryWorker {
    worker_id: usize,
    fanout: Fanout,
    scheduler: RetryScheduler,
    poll_interval: Duration,
}

impl RetryWorker {
    /// Create a worker. `poll_interval` is the pause after an empty poll or a
    /// store error.
    #[must_use]
    pub fn new(
        worker_id: usize,
        fanout: Fanout,
        scheduler: RetryScheduler,
        poll_interval: Duration,
    ) -> Self {
        Self {
            worker_id,
            fanout,
            scheduler,
            poll_interval,
        }
    }

    /// Claim at most one due envelope and try to deliver it.
    pub async fn process_next(&self) -> DeliveryOutcome {
        let worker_id = self.worker_id;

        let raw = match self.scheduler.poll_due(1).await {
            Ok(mut claimed) => match claimed.pop() {
                Some(raw) => raw,
                None => return DeliveryOutcome::Idle,
            },
            Err(e) => {
                error!(worker_id, error = %e, "Failed to poll retry schedule");
                return DeliveryOutcome::StoreError;
            }
        };

        let envelope = match RetryEnvelope::from_json(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(worker_id, error = %e, raw = %raw, "Dropping malformed retry envelope");
                return DeliveryOutcome::Dropped;
            }
        };

        if self.fanout.deliver(&envelope.event).await {
            debug!(
                worker_id,
                user_id = %envelope.event.user_id,
                retry_count = envelope.retry_count,
                "Retry delivered"
            );
            return DeliveryOutcome::Delivered;
        }

        info!(
            worker_id,
            user_id = %envelope.event.user_id,
            retry_count = envelope.retry_count,
            "Retry failed"
        );
        match self
            .scheduler
            .schedule_until_stored(envelope, self.poll_interval)
            .await
        {
            ScheduleOutcome::Scheduled { .. } => DeliveryOutcome::Rescheduled,
            ScheduleOutcome::Escalated { .. } => DeliveryOutcome::Escalated,
        }
    }

    /// Run until the task is dropped.
    pub async fn run(self) {
        loop {
            if self.process_next().await.should_pause() {
                tokio::time::sleep(self.poll_interval).await;
            }
        }
    }
}

/// A fixed number of identical retry workers.
#[derive(Clone)]
pub struct RetryWorkerPool {
    worker_count: usize,
    fanout: Fanout,
    scheduler: RetryScheduler,
    poll_interval: Duration,
}

impl RetryWorkerPool {
    /// Create a pool of `worker_count` workers.
    #[must_use]
    pub fn new(
        worker_count: usize,
        fanout: Fanout,
        scheduler: RetryScheduler,
        poll_interval: Duration,
    ) -> Self {
        Self {
            worker_count,
            fanout,
            scheduler,
            poll_interval,
        }
    }

    /// Number of workers.
    #[must_use]
    pub const fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Spawn every worker on the current runtime.
    #[must_use]
    pub fn spawn(&self) -> Vec<JoinHandle<()>> {
        info!(worker_count = self.worker_count, "Spawning retry workers");

        (0..self.worker_count)
            .map(|worker_id| {
                let worker = RetryWorker::new(
                    worker_id,
                    self.fanout.clone(),
                    self.scheduler.clone(),
                    self.poll_interval,
                );
                tokio::spawn(async move {
                    info!(worker_id, "Retry worker starting");
                    worker.run().await;
                })
            })
            .collect()
    }
}
