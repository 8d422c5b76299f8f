pub mod collector;
pub mod memory;
pub mod percentiles;
pub mod reporter;
pub mod sink;
pub mod stream;

pub use collector::{MetricsCollector, MetricsSnapshot};
pub use reporter::{RequestMetrics, RequestTiming};
pub use sink::{BudgetWarning, ChannelSink, HistogramReport, ReportSink, TracingSink};

/// One completed request observation.
/// The middleware builds these from a `RequestTiming`; the collector owns them.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Route pattern, e.g. "/orgs/:org_id/nodes", never the raw URL
    pub route: String,
    /// HTTP verb
    pub method: String,
    /// Wall time from request entry to response, in milliseconds
    pub duration_ms: f64,
    /// Process resident memory when the request completed, in MB
    pub memory_mb: f64,
}
