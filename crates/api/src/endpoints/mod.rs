//! API endpoints.

mod health;
mod ingest;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/ingest", ingest::router())
        .nest("/health", health::router())
}
