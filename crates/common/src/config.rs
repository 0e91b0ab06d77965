//! Application configuration.

use serde::Deserialize;
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Redis configuration.
    #[serde(default)]
    pub redis: RedisConfig,
    /// Delivery pipeline configuration.
    #[serde(default)]
    pub delivery: DeliveryConfig,
    /// Operator escalation configuration.
    #[serde(default)]
    pub escalation: EscalationConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Emit logs as JSON lines instead of human-readable text.
    #[serde(default)]
    pub json_logs: bool,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// List holding freshly ingested events.
    #[serde(default = "default_queue_key")]
    pub queue_key: String,
    /// Sorted set holding envelopes awaiting redelivery, scored by due time.
    #[serde(default = "default_schedule_key")]
    pub schedule_key: String,
}

/// Delivery pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    /// Retry ceiling. An envelope rescheduled past this count is escalated.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Number of retry workers polling the due-schedule.
    #[serde(default = "default_retry_workers")]
    pub retry_workers: usize,
    /// Pause after an empty poll or a store error, in seconds.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Base of the exponential backoff (`base ^ retry_count` seconds).
    #[serde(default = "default_backoff_base")]
    pub backoff_base: u64,
    /// Upper bound for a single fanout attempt. Unbounded when absent.
    #[serde(default)]
    pub delivery_timeout_secs: Option<u64>,
    /// Ordered destination list every event is fanned out to.
    #[serde(default = "default_destinations")]
    pub destinations: Vec<DestinationConfig>,
}

/// A configured delivery destination.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DestinationConfig {
    /// Succeeds with the given probability.
    Flaky {
        /// Probability of a successful send, in `0.0..=1.0`.
        #[serde(default = "default_success_rate")]
        success_rate: f64,
    },
    /// Sleeps a random duration up to `max_delay_ms`, then succeeds.
    Delayed {
        /// Upper bound of the random delay.
        #[serde(default = "default_max_delay_ms")]
        max_delay_ms: u64,
    },
    /// Always succeeds and logs the event.
    Logging,
    /// POSTs the event as JSON; any 2xx response counts as delivered.
    Webhook {
        /// Target URL.
        url: String,
        /// Request timeout.
        #[serde(default = "default_webhook_timeout_secs")]
        timeout_secs: u64,
    },
}

/// Operator escalation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EscalationConfig {
    /// Recipient of escalation mails. Escalations are only logged when unset.
    #[serde(default)]
    pub admin_email: Option<String>,
    /// Sender address.
    #[serde(default = "default_from_address")]
    pub from_address: String,
    /// SMTP relay settings.
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
}

/// SMTP relay settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    /// SMTP host.
    pub host: String,
    /// SMTP port.
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    /// Username.
    #[serde(default)]
    pub username: Option<String>,
    /// Password.
    #[serde(default)]
    pub password: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8080
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_queue_key() -> String {
    "events".to_string()
}

fn default_schedule_key() -> String {
    "retry_events".to_string()
}

const fn default_max_retries() -> u32 {
    5
}

const fn default_retry_workers() -> usize {
    5
}

const fn default_poll_interval_secs() -> u64 {
    5
}

const fn default_backoff_base() -> u64 {
    2
}

const fn default_success_rate() -> f64 {
    0.8
}

const fn default_max_delay_ms() -> u64 {
    2000
}

const fn default_webhook_timeout_secs() -> u64 {
    30
}

fn default_destinations() -> Vec<DestinationConfig> {
    vec![
        DestinationConfig::Flaky {
            success_rate: default_success_rate(),
        },
        DestinationConfig::Delayed {
            max_delay_ms: default_max_delay_ms(),
        },
        DestinationConfig::Logging,
    ]
}

fn default_from_address() -> String {
    "notify@example.com".to_string()
}

const fn default_smtp_port() -> u16 {
    587
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            json_logs: false,
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            queue_key: default_queue_key(),
            schedule_key: default_schedule_key(),
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_workers: default_retry_workers(),
            poll_interval_secs: default_poll_interval_secs(),
            backoff_base: default_backoff_base(),
            delivery_timeout_secs: None,
            destinations: default_destinations(),
        }
    }
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            admin_email: None,
            from_address: default_from_address(),
            smtp: None,
        }
    }
}

impl DeliveryConfig {
    /// Pause between polls and after store errors.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Bound on a single fanout attempt, if any.
    #[must_use]
    pub fn delivery_timeout(&self) -> Option<Duration> {
        self.delivery_timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present, exported into the process environment)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `EVENTRELAY_ENV`)
    /// 4. Environment variables such as `EVENTRELAY__DELIVERY__MAX_RETRIES`
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let env = std::env::var("EVENTRELAY_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("EVENTRELAY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        let delivery = &self.delivery;
        if delivery.retry_workers == 0 {
            return Err(config::ConfigError::Message(
                "delivery.retry_workers must be at least 1".to_string(),
            ));
        }
        if delivery.backoff_base < 2 {
            return Err(config::ConfigError::Message(
                "delivery.backoff_base must be at least 2".to_string(),
            ));
        }
        if delivery.poll_interval_secs == 0 {
            return Err(config::ConfigError::Message(
                "delivery.poll_interval_secs must be positive".to_string(),
            ));
        }
        if delivery.destinations.is_empty() {
            return Err(config::ConfigError::Message(
                "delivery.destinations must not be empty".to_string(),
            ));
        }
        for destination in &delivery.destinations {
            if let DestinationConfig::Flaky { success_rate } = destination {
                if !(0.0..=1.0).contains(success_rate) {
                    return Err(config::ConfigError::Message(format!(
                        "flaky destination success_rate {success_rate} is outside 0.0..=1.0"
                    )));
                }
            }
        }
        if self.escalation.smtp.is_some() && self.escalation.admin_email.is_none() {
            return Err(config::ConfigError::Message(
                "escalation.admin_email is required when escalation.smtp is set".to_string(),
            ));
        }
        Ok(())
    }
}
