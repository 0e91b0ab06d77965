//! Retry envelope.

use serde::{Deserialize, Serialize};

use super::Event;

/// An event awaiting redelivery, with the number of times it has been
/// rescheduled.
///
/// The field names match the payloads already stored in the retry set, so
/// envelopes written by earlier deployments stay readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryEnvelope {
    /// The event being retried.
    #[serde(rename = "Event")]
    pub event: Event,

    /// Times this envelope has been rescheduled.
    #[serde(rename = "RetryCount")]
    pub retry_count: u32,
}

impl RetryEnvelope {
    /// Wrap an event after its first failed delivery.
    #[must_use]
    pub const fn new(event: Event) -> Self {
        Self {
            event,
            retry_count: 0,
        }
    }

    /// Wrap an event with an explicit retry count.
    #[must_use]
    pub const fn with_retry_count(event: Event, retry_count: u32) -> Self {
        Self { event, retry_count }
    }

    /// The same envelope, rescheduled once more.
    #[must_use]
    pub fn next_attempt(self) -> Self {
        Self {
            event: self.event,
            retry_count: self.retry_count.saturating_add(1),
        }
    }

    /// Serialize to the retry set wire format.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from the retry set wire format.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
