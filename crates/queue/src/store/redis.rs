//! Redis-backed queue and retry schedule.
//!
//! The ingestion queue is a Redis list (`RPUSH` / `BLPOP`) and the retry
//! schedule is a sorted set scored by due timestamp. Claiming due entries runs
//! as a single Lua script so concurrent workers never receive the same entry.
//!
//! Both clients reconnect forever with exponential backoff. A dropped
//! connection surfaces as ordinary command errors until it is re-established,
//! which the consumer and retry loops already treat as transient.

use std::time::Duration;

use async_trait::async_trait;
use fred::clients::Client;
use fred::interfaces::{ClientLike, ListInterface, LuaInterface, SortedSetsInterface};
use fred::types::config::{Config as RedisConfig, ReconnectPolicy};
use tracing::{debug, info};

use super::{EventQueue, RetrySchedule, StoreError};

/// Range-and-remove of due entries, executed atomically by Redis.
///
/// `KEYS[1]` is the schedule key, `ARGV[1]` the highest due score to claim and
/// `ARGV[2]` the maximum number of entries.
pub const CLAIM_DUE_SCRIPT: &str = r"
local due = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, ARGV[2])
if #due > 0 then
    redis.call('ZREM', KEYS[1], unpack(due))
end
return due
";

/// Upper bound on establishing the initial connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Reconnect policy for both clients: unlimited attempts, 100 ms doubling up
/// to 30 s.
#[must_use]
pub fn reconnect_policy() -> ReconnectPolicy {
    ReconnectPolicy::new_exponential(0, 100, 30_000, 2)
}

/// Redis store shared by the consumer, the retry workers and ingestion.
///
/// Blocking pops run on a dedicated connection so they never stall the
/// commands issued by the retry workers.
#[derive(Clone)]
pub struct RedisStore {
    client: Client,
    blocking: Client,
    queue_key: String,
    schedule_key: String,
}

impl RedisStore {
    /// Connect both Redis clients.
    ///
    /// Fails if the server cannot be reached within [`CONNECT_TIMEOUT`].
    pub async fn connect(
        url: &str,
        queue_key: impl Into<String>,
        schedule_key: impl Into<String>,
    ) -> Result<Self, StoreError> {
        Self::connect_with_timeout(url, queue_key, schedule_key, CONNECT_TIMEOUT).await
    }

    /// Like [`RedisStore::connect`] with an explicit bound on the initial
    /// connection. Reconnects after that point are not bounded.
    pub async fn connect_with_timeout(
        url: &str,
        queue_key: impl Into<String>,
        schedule_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let config = RedisConfig::from_url(url)?;

        let client = Client::new(config.clone(), None, None, Some(reconnect_policy()));
        let blocking = Client::new(config, None, None, Some(reconnect_policy()));

        let connected = tokio::time::timeout(timeout, async {
            client.init().await?;
            blocking.init().await?;
            Ok::<_, fred::error::Error>(())
        })
        .await;

        match connected {
            Ok(result) => result?,
            Err(_) => {
                return Err(StoreError::Unavailable(format!(
                    "no Redis connection within {}ms",
                    timeout.as_millis()
                )));
            }
        }

        let store = Self {
            client,
            blocking,
            queue_key: queue_key.into(),
            schedule_key: schedule_key.into(),
        };

        info!(
            queue_key = %store.queue_key,
            schedule_key = %store.schedule_key,
            "Connected to Redis"
        );

        Ok(store)
    }

    /// Round-trip both keys once, returning the queue length and schedule
    /// size.
    pub async fn check(&self) -> Result<(u64, u64), StoreError> {
        let queued = EventQueue::len(self).await?;
        let scheduled = RetrySchedule::count(self).await?;
        debug!(queued, scheduled, "Redis connectivity check passed");
        Ok((queued, scheduled))
    }

    /// Close both connections.
    pub async fn quit(&self) -> Result<(), StoreError> {
        self.blocking.quit().await?;
        self.client.quit().await?;
        info!("Redis store shutdown");
        Ok(())
    }
}

#[async_trait]
impl EventQueue for RedisStore {
    async fn push(&self, item: String) -> Result<(), StoreError> {
        let _: i64 = self.client.rpush(self.queue_key.as_str(), item).await?;
        Ok(())
    }

    async fn blocking_pop(&self) -> Result<String, StoreError> {
        loop {
            // A zero timeout blocks until an item arrives.
            let popped: Option<(String, String)> =
                self.blocking.blpop(self.queue_key.as_str(), 0.0).await?;

            if let Some((_, item)) = popped {
                return Ok(item);
            }
            debug!(queue_key = %self.queue_key, "BLPOP returned without an item");
        }
    }

    async fn len(&self) -> Result<u64, StoreError> {
        Ok(self.client.llen(self.queue_key.as_str()).await?)
    }
}

#[async_trait]
impl RetrySchedule for RedisStore {
    async fn add_with_priority(&self, priority: i64, payload: String) -> Result<(), StoreError> {
        let _: i64 = self
            .client
            .zadd(
                self.schedule_key.as_str(),
                None,
                None,
                false,
                false,
                (priority as f64, payload),
            )
            .await?;
        Ok(())
    }

    async fn pop_due_below(
        &self,
        max_priority: i64,
        limit: usize,
    ) -> Result<Vec<String>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let claimed: Vec<String> = self
            .client
            .eval(
                CLAIM_DUE_SCRIPT,
                self.schedule_key.as_str(),
                vec![max_priority.to_string(), limit.to_string()],
            )
            .await?;

        Ok(claimed)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.client.zcard(self.schedule_key.as_str()).await?)
    }
}
