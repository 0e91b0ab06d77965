//! HTTP API layer for eventrelay.
//!
//! - **Ingest**: `POST /ingest` places events on the delivery queue
//! - **Health**: `GET /health` reports queue and retry-schedule depth
//!
//! Built on Axum 0.8. Tracing and other Tower layers are added by the server.

pub mod endpoints;
pub mod middleware;

pub use endpoints::router;
pub use middleware::AppState;
