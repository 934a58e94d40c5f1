//! HTTP server setup and routing

use axum::{
    routing::{get, post, put},
    Json, Router,
};
use sqlx::SqlitePool;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::badges::BadgeEvaluator;
use crate::earnings::RateTable;
use crate::state::SharedState;
use crate::Result;

/// Shared application context passed to all handlers
///
/// AppContext implements Clone, which gives us `FromRef<AppContext>` for
/// free via Axum's blanket implementation.
#[derive(Clone)]
pub struct AppContext {
    pub state: Arc<SharedState>,
    pub db_pool: SqlitePool,
    /// Injected rate configuration (tests substitute their own)
    pub rates: Arc<RateTable>,
    /// Pluggable badge trigger rules
    pub badges: Arc<BadgeEvaluator>,
    /// Minutes before the scheduled start at which online rooms open
    pub join_lead_minutes: i64,
}

/// Build the application router
pub fn build_router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(health))
        // Session lifecycle
        .route("/sessions", get(super::sessions::list_sessions))
        .route("/sessions/:id", get(super::sessions::get_session))
        .route("/sessions/:id/claim", post(super::sessions::claim))
        .route("/sessions/:id/confirm", post(super::sessions::confirm))
        .route("/sessions/:id/coverage", post(super::sessions::request_coverage))
        .route("/sessions/:id/cancel", post(super::sessions::cancel))
        // Wrap-up workflow
        .route(
            "/sessions/:id/wrapup",
            post(super::wrapup::start)
                .get(super::wrapup::get_wrap_up)
                .delete(super::wrapup::abandon),
        )
        .route(
            "/sessions/:id/wrapup/attendance",
            put(super::wrapup::record_attendance),
        )
        .route(
            "/sessions/:id/wrapup/artifacts/:artifact_id",
            put(super::wrapup::review_artifact),
        )
        .route(
            "/sessions/:id/wrapup/observations",
            put(super::wrapup::record_observations),
        )
        .route("/sessions/:id/wrapup/summary", put(super::wrapup::set_summary))
        .route("/sessions/:id/wrapup/finalize", post(super::wrapup::finalize))
        // Earnings
        .route("/earnings/pay-period", get(super::earnings::current_pay_period))
        // Artifact review queue
        .route("/artifacts", get(super::wrapup::review_queue))
        // SSE events
        .route("/events", get(super::sse::event_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

/// Health check endpoint
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "module": "sprout-iw",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Run the HTTP API server
pub async fn run(ctx: AppContext, port: u16) -> Result<()> {
    let app = build_router(ctx);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
