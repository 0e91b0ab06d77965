//! Health endpoint.

use axum::{Json, Router, extract::State, routing::get};
use eventrelay_common::AppResult;
use serde::Serialize;

use crate::middleware::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `ok` when the stores answered.
    pub status: &'static str,
    /// Server version.
    pub version: &'static str,
    /// Events waiting for the primary consumer.
    pub queued_events: u64,
    /// Envelopes waiting on the retry schedule.
    pub scheduled_retries: u64,
}

async fn health_check(State(state): State<AppState>) -> AppResult<Json<HealthResponse>> {
    let queued_events = state.queue.len().await?;
    let scheduled_retries = state.schedule.count().await?;

    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        queued_events,
        scheduled_retries,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}
