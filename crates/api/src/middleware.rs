//! Shared handler state.

use std::sync::Arc;

use eventrelay_queue::{EventQueue, RetrySchedule};

/// Application state.
#[derive(Clone)]
pub struct AppState {
    /// Ingestion queue events are pushed onto.
    pub queue: Arc<dyn EventQueue>,
    /// Retry schedule, read for health reporting.
    pub schedule: Arc<dyn RetrySchedule>,
}

impl AppState {
    /// Create state over the shared stores.
    #[must_use]
    pub fn new(queue: Arc<dyn EventQueue>, schedule: Arc<dyn RetrySchedule>) -> Self {
        Self { queue, schedule }
    }
}
