//! Report records and the sinks that emit them.
//!
//! Reports are advisory. Every sink method is infallible from the caller's
//! point of view; `ChannelSink` moves the actual write off the request path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::collector::MetricsSnapshot;
use super::percentiles::LatencyHistogram;

/// Log target shared by histogram reports and budget warnings.
pub const REPORT_TARGET: &str = "metadata_api::metrics";

// ─── Records ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportScope {
    Route,
    Global,
}

impl ReportScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Route => "route",
            Self::Global => "global",
        }
    }
}

/// Thresholds in effect when a report was produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Budgets {
    pub latency_ms: f64,
    pub memory_mb: f64,
}

/// One histogram log record. Same schema for both scopes; `route` and
/// `method` are only set for route scope. Durations and memory are rounded
/// to two decimals.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramReport {
    pub scope: ReportScope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    pub budgets: Budgets,
    pub count: usize,
    pub p50_duration_ms: f64,
    pub p95_duration_ms: f64,
    pub max_duration_ms: f64,
    pub memory_mb: f64,
    pub histogram: LatencyHistogram,
}

impl HistogramReport {
    pub fn for_route(
        route: impl Into<String>,
        method: impl Into<String>,
        budgets: Budgets,
        snapshot: MetricsSnapshot,
    ) -> Self {
        let mut report = Self::from_snapshot(ReportScope::Route, budgets, snapshot);
        report.route = Some(route.into());
        report.method = Some(method.into());
        report
    }

    pub fn global(budgets: Budgets, snapshot: MetricsSnapshot) -> Self {
        Self::from_snapshot(ReportScope::Global, budgets, snapshot)
    }

    fn from_snapshot(scope: ReportScope, budgets: Budgets, snapshot: MetricsSnapshot) -> Self {
        Self {
            scope,
            route: None,
            method: None,
            budgets,
            count: snapshot.count,
            p50_duration_ms: round2(snapshot.p50_duration_ms),
            p95_duration_ms: round2(snapshot.p95_duration_ms),
            max_duration_ms: round2(snapshot.max_duration_ms),
            memory_mb: round2(snapshot.memory_mb),
            histogram: snapshot.histogram,
        }
    }
}

/// A request that went over its latency or memory budget.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetWarning {
    pub route: String,
    pub method: String,
    pub duration_ms: f64,
    pub memory_mb: f64,
    pub budgets: Budgets,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ─── Sinks ───────────────────────────────────────────────────────

/// Destination for reports and warnings.
pub trait ReportSink: Send + Sync {
    fn histogram(&self, report: HistogramReport);
    fn budget_exceeded(&self, warning: BudgetWarning);
}

/// Writes records as structured `tracing` events.
///
/// `tracing` fields are flat, so the histogram goes out as one JSON-encoded
/// field in bucket order.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ReportSink for TracingSink {
    fn histogram(&self, report: HistogramReport) {
        let histogram = serde_json::to_string(&report.histogram).unwrap_or_default();
        info!(
            target: REPORT_TARGET,
            scope = report.scope.as_str(),
            route = report.route.as_deref(),
            method = report.method.as_deref(),
            latency_budget_ms = report.budgets.latency_ms,
            memory_budget_mb = report.budgets.memory_mb,
            count = report.count,
            p50_duration_ms = report.p50_duration_ms,
            p95_duration_ms = report.p95_duration_ms,
            max_duration_ms = report.max_duration_ms,
            memory_mb = report.memory_mb,
            histogram = %histogram,
            "request histogram"
        );
    }

    fn budget_exceeded(&self, warning: BudgetWarning) {
        warn!(
            target: REPORT_TARGET,
            route = %warning.route,
            method = %warning.method,
            duration_ms = round2(warning.duration_ms),
            memory_mb = round2(warning.memory_mb),
            latency_budget_ms = warning.budgets.latency_ms,
            memory_budget_mb = warning.budgets.memory_mb,
            "Performance budget exceeded"
        );
    }
}

enum ReportEvent {
    Histogram(HistogramReport),
    BudgetExceeded(BudgetWarning),
}

/// Non-blocking front for another sink.
///
/// Records go through a bounded channel with `try_send`; a background task
/// forwards them to the inner sink. A full or closed queue drops the record
/// and bumps `dropped()`, so a slow writer never holds up a response.
pub struct ChannelSink {
    tx: RwLock<Option<mpsc::Sender<ReportEvent>>>,
    dropped: AtomicU64,
}

impl ChannelSink {
    /// Starts the forwarding task. Must be called inside a tokio runtime.
    /// The returned handle completes once `close()` was called and the
    /// queue is drained.
    pub fn spawn(inner: Arc<dyn ReportSink>, capacity: usize) -> (Arc<Self>, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<ReportEvent>(capacity.max(1));

        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    ReportEvent::Histogram(report) => inner.histogram(report),
                    ReportEvent::BudgetExceeded(warning) => inner.budget_exceeded(warning),
                }
            }
            debug!("Report queue drained");
        });

        let sink = Arc::new(Self {
            tx: RwLock::new(Some(tx)),
            dropped: AtomicU64::new(0),
        });
        (sink, handle)
    }

    /// Stops accepting records. Already queued ones are still delivered.
    pub fn close(&self) {
        self.tx.write().take();
    }

    /// Records discarded because the queue was full or closed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn send(&self, event: ReportEvent) {
        let sent = match self.tx.read().as_ref() {
            Some(tx) => tx.try_send(event).is_ok(),
            None => false,
        };
        if !sent {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(dropped, "Report queue unavailable, record dropped");
        }
    }
}

impl ReportSink for ChannelSink {
    fn histogram(&self, report: HistogramReport) {
        self.send(ReportEvent::Histogram(report));
    }

    fn budget_exceeded(&self, warning: BudgetWarning) {
        self.send(ReportEvent::BudgetExceeded(warning));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_HISTOGRAM_BUCKETS_MS;
    use parking_lot::Mutex;
    use tracing_test::traced_test;

    const BUDGETS: Budgets = Budgets {
        latency_ms: 200.0,
        memory_mb: 256.0,
    };

    fn snapshot() -> MetricsSnapshot {
        let mut snap = MetricsSnapshot::empty(&DEFAULT_HISTOGRAM_BUCKETS_MS);
        snap.count = 2;
        snap.p50_duration_ms = 12.3456;
        snap.p95_duration_ms = 99.999;
        snap.max_duration_ms = 99.999;
        snap.memory_mb = 47.125;
        snap
    }

    #[derive(Default)]
    struct Collecting(Mutex<Vec<HistogramReport>>);

    impl ReportSink for Collecting {
        fn histogram(&self, report: HistogramReport) {
            self.0.lock().push(report);
        }
        fn budget_exceeded(&self, _warning: BudgetWarning) {}
    }

    #[test]
    fn rounds_to_two_decimals() {
        let report = HistogramReport::global(BUDGETS, snapshot());
        assert_eq!(report.p50_duration_ms, 12.35);
        assert_eq!(report.p95_duration_ms, 100.0);
        assert_eq!(report.memory_mb, 47.13);
    }

    #[test]
    fn global_record_omits_route_fields() {
        let json = serde_json::to_value(HistogramReport::global(BUDGETS, snapshot())).unwrap();
        assert_eq!(json["scope"], "global");
        assert!(json.get("route").is_none());
        assert!(json.get("method").is_none());
        assert_eq!(json["budgets"]["latencyMs"], 200.0);
        assert_eq!(json["budgets"]["memoryMb"], 256.0);
        assert_eq!(json["histogram"][">500"], 0);
    }

    #[test]
    fn route_record_carries_route_and_method() {
        let report = HistogramReport::for_route("/health", "GET", BUDGETS, snapshot());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["scope"], "route");
        assert_eq!(json["route"], "/health");
        assert_eq!(json["method"], "GET");
        assert_eq!(json["count"], 2);
    }

    #[test]
    #[traced_test]
    fn tracing_sink_emits_structured_events() {
        TracingSink.histogram(HistogramReport::for_route("/health", "GET", BUDGETS, snapshot()));
        TracingSink.budget_exceeded(BudgetWarning {
            route: "/health".into(),
            method: "GET".into(),
            duration_ms: 250.0,
            memory_mb: 10.0,
            budgets: BUDGETS,
        });

        assert!(logs_contain("request histogram"));
        assert!(logs_contain("scope=\"route\""));
        assert!(logs_contain(r#"histogram={"<=25":0,"<=50":0"#));
        assert!(logs_contain("Performance budget exceeded"));
        assert!(logs_contain("duration_ms=250"));
    }

    #[tokio::test]
    async fn channel_sink_forwards_then_drains_on_close() {
        let inner = Arc::new(Collecting::default());
        let (sink, worker) = ChannelSink::spawn(inner.clone(), 8);

        sink.histogram(HistogramReport::global(BUDGETS, snapshot()));
        sink.histogram(HistogramReport::global(BUDGETS, snapshot()));
        sink.close();
        worker.await.unwrap();

        assert_eq!(inner.0.lock().len(), 2);
        assert_eq!(sink.dropped(), 0);
    }

    #[tokio::test]
    async fn channel_sink_drops_when_full_or_closed() {
        let inner = Arc::new(Collecting::default());
        let (sink, worker) = ChannelSink::spawn(inner.clone(), 1);

        // The forwarding task cannot run until we yield, so the second
        // record finds the single slot taken.
        sink.histogram(HistogramReport::global(BUDGETS, snapshot()));
        sink.histogram(HistogramReport::global(BUDGETS, snapshot()));
        assert_eq!(sink.dropped(), 1);

        sink.close();
        sink.histogram(HistogramReport::global(BUDGETS, snapshot()));
        assert_eq!(sink.dropped(), 2);

        worker.await.unwrap();
        assert_eq!(inner.0.lock().len(), 1);
    }
}
