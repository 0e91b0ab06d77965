//! At-least-once event delivery engine for eventrelay.
//!
//! This crate holds everything between the ingestion queue and the
//! destinations:
//!
//! - **Jobs**: the [`Event`] model and its [`RetryEnvelope`]
//! - **Store**: the shared ingestion queue and due-schedule (Redis or memory)
//! - **Fanout**: ordered, all-or-nothing delivery to [`Destination`]s
//! - **Scheduler**: exponential backoff, retry ceiling and escalation
//! - **Workers**: the primary consumer and the retry worker pool
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use eventrelay_queue::{
//!     DeliveryEngine, Destination, EngineConfig, Fanout, LogEscalation, LoggingDestination,
//!     MemoryStore, SystemClock,
//! };
//!
//! # async fn run() {
//! let store = MemoryStore::new();
//! let fanout = Fanout::new(vec![Arc::new(LoggingDestination) as Arc<dyn Destination>]);
//! let engine = DeliveryEngine::new(
//!     Arc::new(store.clone()),
//!     Arc::new(store),
//!     fanout,
//!     Arc::new(LogEscalation),
//!     Arc::new(SystemClock),
//!     EngineConfig::default(),
//! );
//! let handle = engine.start();
//! # handle.abort();
//! # }
//! ```

pub mod clock;
pub mod destination;
pub mod engine;
pub mod escalation;
pub mod fanout;
pub mod jobs;
pub mod retry;
pub mod scheduler;
pub mod store;
pub mod workers;

pub use clock::{Clock, ManualClock, SystemClock};
pub use destination::{
    DelayedDestination, Destination, FlakyDestination, LoggingDestination, WebhookDestination,
    build_destinations,
};
pub use engine::{DeliveryEngine, EngineConfig, EngineHandle};
pub use escalation::{
    EscalationError, EscalationSink, LogEscalation, SmtpEscalation, build_escalation, escalate,
};
pub use fanout::Fanout;
pub use jobs::*;
pub use retry::{ESCALATION_SUBJECT, ExhaustedDelivery, RetryConfig};
pub use scheduler::{RetryScheduler, ScheduleOutcome};
pub use store::{EventQueue, MemoryStore, RedisStore, RetrySchedule, StoreError};
pub use workers::*;
