//! Primary queue consumer.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::DeliveryOutcome;
use crate::fanout::Fanout;
use crate::jobs::{Event, RetryEnvelope};
use crate::scheduler::{RetryScheduler, ScheduleOutcome};
use crate::store::EventQueue;

/// Drains the ingestion queue and hands failed deliveries to the scheduler.
#[derive(Clone)]
pub struct PrimaryConsumer {
    queue: Arc<dyn EventQueue>,
    fanout: Fanout,
    scheduler: RetryScheduler,
    error_backoff: Duration,
}

impl PrimaryConsumer {
    /// Create a consumer. `error_backoff` is the pause after a queue error.
    #[must_use]
    pub fn new(
        queue: Arc<dyn EventQueue>,
        fanout: Fanout,
        scheduler: RetryScheduler,
        error_backoff: Duration,
    ) -> Self {
        Self {
            queue,
            fanout,
            scheduler,
            error_backoff,
        }
    }

    /// Consume one event, waiting as long as it takes for one to arrive.
    pub async fn consume_next(&self) -> DeliveryOutcome {
        let raw = match self.queue.blocking_pop().await {
            Ok(raw) => raw,
            Err(e) => {
                error!(error = %e, "Failed to dequeue event");
                return DeliveryOutcome::StoreError;
            }
        };

        let event = match Event::from_json(&raw) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, raw = %raw, "Dropping malformed event");
                return DeliveryOutcome::Dropped;
            }
        };

        if self.fanout.deliver(&event).await {
            debug!(user_id = %event.user_id, "Event delivered");
            return DeliveryOutcome::Delivered;
        }

        info!(user_id = %event.user_id, "Delivery failed, scheduling retry");
        match self
            .scheduler
            .schedule_until_stored(RetryEnvelope::new(event), self.error_backoff)
            .await
        {
            ScheduleOutcome::Scheduled { .. } => DeliveryOutcome::Rescheduled,
            ScheduleOutcome::Escalated { .. } => DeliveryOutcome::Escalated,
        }
    }

    /// Run until the task is dropped.
    pub async fn run(self) {
        info!("Primary consumer started");
        loop {
            if self.consume_next().await.should_pause() {
                tokio::time::sleep(self.error_backoff).await;
            }
        }
    }
}
