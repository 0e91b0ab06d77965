//! eventrelay server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use eventrelay_api::{AppState, router as api_router};
use eventrelay_common::Config;
use eventrelay_queue::{
    DeliveryEngine, EngineConfig, Fanout, RedisStore, SystemClock, build_destinations,
    build_escalation,
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "eventrelay=debug,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    init_tracing(config.server.json_logs);
    info!("Starting eventrelay server...");

    // Connect to Redis
    info!("Connecting to Redis...");
    let store = RedisStore::connect(
        &config.redis.url,
        config.redis.queue_key.clone(),
        config.redis.schedule_key.clone(),
    )
    .await?;
    let (queued, scheduled) = store.check().await?;
    info!(queued, scheduled, "Redis store ready");

    // Build the delivery pipeline
    let fanout = Fanout::new(build_destinations(&config.delivery.destinations)?)
        .with_timeout(config.delivery.delivery_timeout());
    info!(destinations = fanout.len(), "Fanout configured");
    let escalation = build_escalation(&config.escalation)?;

    let shared = Arc::new(store.clone());
    let engine = DeliveryEngine::new(
        shared.clone(),
        shared.clone(),
        fanout,
        escalation,
        Arc::new(SystemClock),
        EngineConfig::from(&config.delivery),
    );
    let engine_handle = engine.start();

    // Build router
    let state = AppState::new(shared.clone(), shared);
    let app = Router::new()
        .merge(api_router())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    engine_handle.abort();
    if let Err(e) = store.quit().await {
        error!(error = %e, "Failed to close Redis connections");
    }

    info!("Server shutdown complete");
    Ok(())
}
