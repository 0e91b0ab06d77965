//! Delivery destinations.
//!
//! A destination receives one event and reports whether it accepted it.
//! Failures are ordinary `false` results, never errors: the retry scheduler
//! decides what happens next.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eventrelay_common::DestinationConfig;
use rand::Rng;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::jobs::Event;

/// A downstream target an event is fanned out to.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Deliver the event. Returns `true` when the destination accepted it.
    async fn send(&self, event: &Event) -> bool;
}

/// Succeeds with a fixed probability.
#[derive(Debug, Clone)]
pub struct FlakyDestination {
    success_rate: f64,
}

impl FlakyDestination {
    /// Create a destination that succeeds with probability `success_rate`.
    #[must_use]
    pub const fn new(success_rate: f64) -> Self {
        Self { success_rate }
    }
}

#[async_trait]
impl Destination for FlakyDestination {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn send(&self, event: &Event) -> bool {
        let accepted = rand::thread_rng().gen_bool(self.success_rate.clamp(0.0, 1.0));
        if accepted {
            debug!(user_id = %event.user_id, "Flaky destination received event");
        } else {
            debug!(user_id = %event.user_id, "Flaky destination rejected event");
        }
        accepted
    }
}

/// Sleeps a random duration, then succeeds.
#[derive(Debug, Clone)]
pub struct DelayedDestination {
    max_delay: Duration,
}

impl DelayedDestination {
    /// Create a destination that waits up to `max_delay` per call.
    #[must_use]
    pub const fn new(max_delay: Duration) -> Self {
        Self { max_delay }
    }
}

#[async_trait]
impl Destination for DelayedDestination {
    fn name(&self) -> &str {
        "delayed"
    }

    async fn send(&self, event: &Event) -> bool {
        let max_ms = u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX);
        let delay = if max_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
        };

        tokio::time::sleep(delay).await;
        debug!(
            user_id = %event.user_id,
            delay_ms = delay.as_millis() as u64,
            "Delayed destination received event"
        );
        true
    }
}

/// Always succeeds and logs the event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingDestination;

#[async_trait]
impl Destination for LoggingDestination {
    fn name(&self) -> &str {
        "logging"
    }

    async fn send(&self, event: &Event) -> bool {
        info!(user_id = %event.user_id, payload = %event.payload, "Received event");
        true
    }
}

/// POSTs the event as JSON to a URL.
#[derive(Debug, Clone)]
pub struct WebhookDestination {
    url: String,
    http_client: Client,
}

impl WebhookDestination {
    /// Create a webhook destination with a per-request timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            url: url.into(),
            http_client: Client::builder().timeout(timeout).build()?,
        })
    }
}

#[async_trait]
impl Destination for WebhookDestination {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, event: &Event) -> bool {
        match self.http_client.post(&self.url).json(event).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(
                    url = %self.url,
                    status = %response.status(),
                    "Webhook rejected event"
                );
                false
            }
            Err(e) => {
                warn!(url = %self.url, error = %e, "Webhook request failed");
                false
            }
        }
    }
}

/// Build the ordered destination list from configuration.
pub fn build_destinations(
    configs: &[DestinationConfig],
) -> Result<Vec<Arc<dyn Destination>>, reqwest::Error> {
    configs
        .iter()
        .map(|config| -> Result<Arc<dyn Destination>, reqwest::Error> {
            Ok(match config {
                DestinationConfig::Flaky { success_rate } => {
                    Arc::new(FlakyDestination::new(*success_rate))
                }
                DestinationConfig::Delayed { max_delay_ms } => {
                    Arc::new(DelayedDestination::new(Duration::from_millis(*max_delay_ms)))
                }
                DestinationConfig::Logging => Arc::new(LoggingDestination),
                DestinationConfig::Webhook { url, timeout_secs } => Arc::new(
                    WebhookDestination::new(url.clone(), Duration::from_secs(*timeout_secs))?,
                ),
            })
        })
        .collect()
}
