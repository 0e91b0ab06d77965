//! All-or-nothing fanout of one event to an ordered destination list.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::destination::Destination;
use crate::jobs::Event;

/// Sends an event to every destination in order.
///
/// The first destination that returns `false` stops the fanout and fails the
/// whole attempt; destinations after it are not called. A retried event is
/// fanned out again from the first destination, so destinations must tolerate
/// duplicates.
#[derive(Clone)]
pub struct Fanout {
    destinations: Vec<Arc<dyn Destination>>,
    timeout: Option<Duration>,
}

impl Fanout {
    /// Create a fanout over the given destinations.
    #[must_use]
    pub fn new(destinations: Vec<Arc<dyn Destination>>) -> Self {
        Self {
            destinations,
            timeout: None,
        }
    }

    /// Bound each attempt. An attempt that runs past the limit counts as a
    /// failure.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Number of destinations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    /// Whether there are no destinations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    /// Deliver the event to all destinations. Returns `true` only if every
    /// destination accepted it.
    pub async fn deliver(&self, event: &Event) -> bool {
        let Some(limit) = self.timeout else {
            return self.deliver_in_order(event).await;
        };

        if let Ok(delivered) = tokio::time::timeout(limit, self.deliver_in_order(event)).await {
            delivered
        } else {
            warn!(
                user_id = %event.user_id,
                timeout_ms = limit.as_millis() as u64,
                "Delivery attempt timed out"
            );
            false
        }
    }

    async fn deliver_in_order(&self, event: &Event) -> bool {
        for destination in &self.destinations {
            if !destination.send(event).await {
                debug!(
                    destination = destination.name(),
                    user_id = %event.user_id,
                    "Destination failed, aborting fanout"
                );
                return false;
            }
        }
        true
    }
}
