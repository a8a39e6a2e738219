pub mod handlers;
pub mod state;

use crate::{config::Config, error::Result, metrics};
use axum::{
    Router,
    extract::Request,
    http::HeaderValue,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use state::AppState;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info};

/// Build the application router around `state`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::health::health_check))
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::health::render_metrics))
        .route("/metadata", get(handlers::lookup::get_metadata))
        .route("/watch/{kind}/{id}", get(handlers::lookup::get_watch_link))
        .route(
            "/users/{user_id}/queries",
            post(handlers::lookup::post_query),
        )
        .route(
            "/users/{user_id}/history",
            get(handlers::users::get_history),
        )
        .route("/users/{user_id}/stats", get(handlers::users::get_stats))
        .layer(middleware::from_fn(version_header))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Stamp every response with the crate version.
async fn version_header(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    response.headers_mut().insert(
        "x-cinelink-version",
        HeaderValue::from_static(env!("CARGO_PKG_VERSION")),
    );
    response
}

/// Periodically drop expired entries from both caches until `shutdown` fires.
pub fn spawn_cache_sweeper(
    state: AppState,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let metadata = state.service.metadata().cache().purge_expired();
                    let watch = state.service.watch().cache().purge_expired();
                    debug!(
                        "Cache sweep dropped {} metadata and {} watch entries",
                        metadata, watch
                    );
                }
            }
        }
    })
}

/// Start the Axum HTTP server
pub async fn start(config: Config) -> Result<()> {
    let addr = format!("0.0.0.0:{}", config.port);
    let sweep_interval = config.cache_sweep_interval();

    let mut state = AppState::new(config)?;
    match metrics::install() {
        Ok(handle) => state = state.with_metrics(handle),
        Err(e) => error!("Metrics disabled: {}", e),
    }

    let shutdown = CancellationToken::new();
    let sweeper = spawn_cache_sweeper(state.clone(), sweep_interval, shutdown.clone());

    let app = build_router(state);

    let listener = match tokio::net::TcpListener::bind(addr.as_str()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to address {}: {}", addr, e);
            return Err(e.into());
        }
    };

    info!("Server listening on http://{}", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    shutdown.cancel();
    let _ = sweeper.await;

    if let Err(e) = served {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
