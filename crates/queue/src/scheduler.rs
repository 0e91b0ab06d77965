//! Retry scheduler: backoff, due-schedule persistence and the retry ceiling.
//!
//! An envelope moves through `Scheduled(1) -> Scheduled(2) -> ...` until it is
//! either delivered or rescheduled past the ceiling, at which point it is
//! escalated and never stored again.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::clock::Clock;
use crate::escalation::{EscalationSink, escalate};
use crate::jobs::RetryEnvelope;
use crate::retry::{ExhaustedDelivery, RetryConfig};
use crate::store::{RetrySchedule, StoreError};

/// What [`RetryScheduler::schedule_retry`] did with an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// Stored on the due-schedule.
    Scheduled {
        /// Retry count the envelope was stored with.
        retry_count: u32,
        /// Unix timestamp at which it becomes due.
        due_at: i64,
    },
    /// Past the ceiling; the operator was notified.
    Escalated {
        /// Attempt count reported in the escalation.
        attempts: u32,
    },
}

/// Computes backoff, stores retries and claims due ones.
#[derive(Clone)]
pub struct RetryScheduler {
    schedule: Arc<dyn RetrySchedule>,
    escalation: Arc<dyn EscalationSink>,
    clock: Arc<dyn Clock>,
    config: RetryConfig,
}

impl RetryScheduler {
    /// Create a scheduler over a shared due-schedule.
    #[must_use]
    pub fn new(
        schedule: Arc<dyn RetrySchedule>,
        escalation: Arc<dyn EscalationSink>,
        clock: Arc<dyn Clock>,
        config: RetryConfig,
    ) -> Self {
        Self {
            schedule,
            escalation,
            clock,
            config,
        }
    }

    /// Record one more failed attempt for `envelope`.
    ///
    /// The retry count is incremented first. Past the ceiling the envelope is
    /// escalated instead of stored; escalation failures are logged and do not
    /// surface here. Otherwise it is stored due at `now + base ^ retry_count`.
    ///
    /// # Errors
    /// Returns an error if the due-schedule cannot be written. The envelope is
    /// then not stored; see [`RetryScheduler::schedule_until_stored`].
    pub async fn schedule_retry(
        &self,
        envelope: RetryEnvelope,
    ) -> Result<ScheduleOutcome, StoreError> {
        let envelope = envelope.next_attempt();
        let retry_count = envelope.retry_count;

        if !self.config.should_retry(retry_count) {
            let attempts = self.config.max_retries;
            let exhausted = ExhaustedDelivery::new(envelope.event, attempts, self.clock.now());
            escalate(self.escalation.as_ref(), &exhausted).await;
            return Ok(ScheduleOutcome::Escalated { attempts });
        }

        let delay = self.config.delay_for_attempt(retry_count);
        let due_at = self
            .clock
            .unix_timestamp()
            .saturating_add(i64::try_from(delay.as_secs()).unwrap_or(i64::MAX));

        let payload = envelope.to_json()?;
        self.schedule.add_with_priority(due_at, payload).await?;

        info!(
            user_id = %envelope.event.user_id,
            retry_count,
            delay_secs = delay.as_secs(),
            due_at,
            "Scheduled retry"
        );
        Ok(ScheduleOutcome::Scheduled {
            retry_count,
            due_at,
        })
    }

    /// Like [`RetryScheduler::schedule_retry`], but keeps trying after store
    /// errors, pausing `pause` between attempts, until the envelope is stored
    /// or escalated.
    pub async fn schedule_until_stored(
        &self,
        envelope: RetryEnvelope,
        pause: Duration,
    ) -> ScheduleOutcome {
        loop {
            match self.schedule_retry(envelope.clone()).await {
                Ok(outcome) => return outcome,
                Err(e) => {
                    error!(
                        error = %e,
                        user_id = %envelope.event.user_id,
                        "Failed to schedule retry, will try again"
                    );
                    tokio::time::sleep(pause).await;
                }
            }
        }
    }

    /// Claim up to `max_count` due payloads, earliest first.
    ///
    /// Claimed payloads are already removed from the schedule; no other poller
    /// receives them.
    ///
    /// # Errors
    /// Returns an error if the due-schedule cannot be read.
    pub async fn poll_due(&self, max_count: usize) -> Result<Vec<String>, StoreError> {
        let now = self.clock.unix_timestamp();
        let claimed = self.schedule.pop_due_below(now, max_count).await?;
        if !claimed.is_empty() {
            debug!(count = claimed.len(), now, "Claimed due retries");
        }
        Ok(claimed)
    }
}
