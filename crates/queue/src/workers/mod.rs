//! Delivery workers.

mod primary;
mod retry;

pub use primary::PrimaryConsumer;
pub use retry::{RetryWorker, RetryWorkerPool};

/// Result of one worker iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Every destination accepted the event.
    Delivered,
    /// Delivery failed and the envelope went back on the schedule.
    Rescheduled,
    /// Delivery failed past the retry ceiling and was escalated.
    Escalated,
    /// The payload could not be parsed and was discarded.
    Dropped,
    /// Nothing was due.
    Idle,
    /// The store could not be reached.
    StoreError,
}

impl DeliveryOutcome {
    /// Whether the loop should pause before its next iteration.
    #[must_use]
    pub const fn should_pause(self) -> bool {
        matches!(self, Self::Idle | Self::StoreError)
    }
}
