//! Retry policy and exhausted-delivery records.

use std::time::Duration;

use chrono::{DateTime, Utc};
use eventrelay_common::DeliveryConfig;

use crate::jobs::Event;

/// Subject line of every escalation.
pub const ESCALATION_SUBJECT: &str = "Event Delivery Failed";

/// Retry configuration with pure exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of reschedules before escalation.
    pub max_retries: u32,
    /// Base of the backoff; the delay is `base ^ retry_count` seconds.
    pub backoff_base: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_base: 2,
        }
    }
}

impl From<&DeliveryConfig> for RetryConfig {
    fn from(config: &DeliveryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_base: config.backoff_base,
        }
    }
}

impl RetryConfig {
    /// Delay before an envelope with the given (already incremented) retry
    /// count becomes due. No jitter and no cap.
    #[must_use]
    pub const fn delay_for_attempt(&self, retry_count: u32) -> Duration {
        Duration::from_secs(self.backoff_base.saturating_pow(retry_count))
    }

    /// Whether an envelope with the given (already incremented) retry count
    /// may go back on the schedule.
    #[must_use]
    pub const fn should_retry(&self, retry_count: u32) -> bool {
        retry_count <= self.max_retries
    }
}

/// An event whose retries are exhausted.
#[derive(Debug, Clone)]
pub struct ExhaustedDelivery {
    /// The undeliverable event.
    pub event: Event,
    /// Number of attempts reported to the operator.
    pub attempts: u32,
    /// When the final reschedule was refused.
    pub failed_at: DateTime<Utc>,
}

impl ExhaustedDelivery {
    /// Create a new record.
    #[must_use]
    pub const fn new(event: Event, attempts: u32, failed_at: DateTime<Utc>) -> Self {
        Self {
            event,
            attempts,
            failed_at,
        }
    }

    /// Escalation subject.
    #[must_use]
    pub const fn subject(&self) -> &'static str {
        ESCALATION_SUBJECT
    }

    /// Escalation body.
    #[must_use]
    pub fn body(&self) -> String {
        format!(
            "Failed to deliver event after {} attempts: {}",
            self.attempts, self.event
        )
    }
}
