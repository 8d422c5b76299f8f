use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;

use super::collector::MetricsSnapshot;
use crate::AppState;

/// Optional `?route=/orgs/:org_id/nodes` filter.
#[derive(Debug, Default, Deserialize)]
pub struct SnapshotQuery {
    pub route: Option<String>,
}

// ─── GET /metrics ────────────────────────────────────────────────
/// Current window snapshot as JSON.

pub async fn get_metrics(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SnapshotQuery>,
) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot(query.route.as_deref()))
}

// ─── GET /metrics/stream ─────────────────────────────────────────
/// Server-Sent Events endpoint pushing a fresh snapshot every 500 ms.

pub async fn metrics_stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SnapshotQuery>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let interval = tokio::time::interval(Duration::from_millis(500));

    let stream = IntervalStream::new(interval).map(move |_| {
        let snapshot = state.metrics.snapshot(query.route.as_deref());
        let json = serde_json::to_string(&snapshot).unwrap_or_default();
        Ok(Event::default().event("snapshot").data(json))
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
