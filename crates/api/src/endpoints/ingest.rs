//! Event ingestion endpoint.

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{Method, StatusCode},
    routing::post,
};
use eventrelay_common::{AppError, AppResult};
use eventrelay_queue::Event;
use tracing::debug;

use crate::middleware::AppState;

/// Body returned for an accepted event.
pub const INGEST_SUCCESS: &str = "Event ingested successfully";

/// Accept one event and place it on the queue.
///
/// The event is acknowledged once it is on the queue; delivery happens later.
async fn ingest_event(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<(StatusCode, &'static str)> {
    let event = Event::from_json_bytes(&body)?;
    let serialized = event
        .to_json()
        .map_err(|e| AppError::Internal(e.to_string()))?;

    state.queue.push(serialized).await?;

    debug!(user_id = %event.user_id, "Event ingested");
    Ok((StatusCode::OK, INGEST_SUCCESS))
}

async fn method_not_allowed(method: Method) -> AppError {
    AppError::MethodNotAllowed(format!("{method} is not supported, use POST"))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(ingest_event).fallback(method_not_allowed))
}
