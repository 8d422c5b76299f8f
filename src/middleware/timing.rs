use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::metrics::RequestMetrics;

/// Shared label for requests no route matched; keeps the per-route counters
/// bounded by the router's route table.
pub const UNMATCHED_ROUTE: &str = "<unmatched>";

/// Route pattern for the metrics window: the matched router path
/// (`/orgs/:org_id/nodes`), or `UNMATCHED_ROUTE`.
pub fn route_pattern(req: &Request) -> String {
    req.extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_owned())
}

/// Feeds every request through the collector's start/end hooks and adds
/// two response headers:
///
///   X-Response-Time-Us: handler wall time in microseconds
///   Server-Timing: same value in the standard Server-Timing format
///
/// Error responses are regular responses here, so they are measured too.
pub async fn timing_middleware(
    State(metrics): State<Arc<RequestMetrics>>,
    req: Request,
    next: Next,
) -> Response {
    let timing = metrics.on_request_start(route_pattern(&req), req.method().as_str());

    let mut response = next.run(req).await;
    let elapsed = metrics.on_request_end(timing);

    // ── Inject response headers ─────────────────────────────────
    if let Ok(val) = elapsed.as_micros().to_string().parse() {
        response.headers_mut().insert("X-Response-Time-Us", val);
    }

    let server_timing = format!("total;dur={:.3}", elapsed.as_secs_f64() * 1000.0);
    if let Ok(val) = server_timing.parse() {
        response.headers_mut().insert("Server-Timing", val);
    }

    response
}
