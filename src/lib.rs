//! Metadata graph API with an in-process request metrics collector.
//!
//! Every API request passes through [`middleware::timing`], which feeds the
//! [`metrics::RequestMetrics`] window. The collector keeps the most recent
//! samples, logs per-route and global latency histograms on a fixed request
//! cadence, and warns when a request exceeds its latency or memory budget.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod server;
pub mod services;

use std::sync::Arc;

use chrono::{DateTime, Utc};

pub use config::{Args, MetricsConfig};
pub use error::{AppError, ConfigError};
pub use server::create_router;

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// Request metrics collector; the timing middleware writes, diagnostics read.
    pub metrics: Arc<metrics::RequestMetrics>,

    /// In-memory metadata graph.
    pub graph: Arc<services::GraphStore>,

    /// Process start, reported by `/health`.
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(metrics: Arc<metrics::RequestMetrics>) -> Self {
        Self {
            metrics,
            graph: Arc::new(services::GraphStore::new()),
            started_at: Utc::now(),
        }
    }
}
