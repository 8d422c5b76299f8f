use axum::{
    middleware as axum_mw,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::metrics::stream;
use crate::middleware::timing;
use crate::AppState;

/// Builds the full Axum `Router` with all routes and middleware.
pub fn create_router(state: Arc<AppState>) -> Router {
    // ── Measured API routes ─────────────────────────────────────
    let api = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/orgs/:org_id/nodes", post(handlers::graph::upsert_nodes))
        .route("/orgs/:org_id/edges", post(handlers::graph::upsert_edges))
        .fallback(handlers::not_found)
        // Applied per route, so MatchedPath is already set when it runs.
        .layer(axum_mw::from_fn_with_state(
            state.metrics.clone(),
            timing::timing_middleware,
        ));

    // ── Diagnostics (not measured) ──────────────────────────────
    let diagnostics = Router::new()
        .route("/metrics", get(stream::get_metrics))
        .route("/metrics/stream", get(stream::metrics_stream));

    Router::new()
        .merge(diagnostics)
        .merge(api)
        .with_state(state)
        // ── Global middleware (applied bottom-up) ───────────────
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
