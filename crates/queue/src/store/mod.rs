//! Shared queue and retry-schedule stores.
//!
//! The ingestion queue and the due-schedule are the only state shared between
//! the primary consumer and the retry workers. Every operation here is a single
//! indivisible step against the backing store; callers never read-modify-write
//! the same item across two calls.

#![allow(missing_docs)]

mod memory;
mod redis;

use async_trait::async_trait;
use eventrelay_common::AppError;
use thiserror::Error;

pub use memory::MemoryStore;
pub use redis::{CLAIM_DUE_SCRIPT, RedisStore};

/// Store error type.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<fred::error::Error> for StoreError {
    fn from(err: fred::error::Error) -> Self {
        Self::Redis(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Redis(msg) => Self::Redis(msg),
            StoreError::Unavailable(msg) => Self::Queue(msg),
            StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}

/// Durable FIFO of freshly ingested, serialized events.
#[async_trait]
pub trait EventQueue: Send + Sync {
    /// Append an item to the tail of the queue.
    async fn push(&self, item: String) -> Result<(), StoreError>;

    /// Remove and return the head of the queue, suspending until one exists.
    async fn blocking_pop(&self) -> Result<String, StoreError>;

    /// Number of queued items.
    async fn len(&self) -> Result<u64, StoreError>;

    /// Whether the queue is empty.
    async fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len().await? == 0)
    }
}

/// Time-ordered set of serialized retry envelopes, keyed by due timestamp.
#[async_trait]
pub trait RetrySchedule: Send + Sync {
    /// Insert a payload that becomes due at `priority` (unix seconds).
    async fn add_with_priority(&self, priority: i64, payload: String) -> Result<(), StoreError>;

    /// Atomically claim and remove up to `limit` payloads whose priority is at
    /// most `max_priority`, earliest first.
    async fn pop_due_below(
        &self,
        max_priority: i64,
        limit: usize,
    ) -> Result<Vec<String>, StoreError>;

    /// Number of scheduled payloads.
    async fn count(&self) -> Result<u64, StoreError>;
}
