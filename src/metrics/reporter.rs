use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::info;

use super::collector::{MetricsCollector, MetricsSnapshot};
use super::memory::{FallbackGauge, MemoryGauge, ProcessMemory};
use super::sink::{BudgetWarning, Budgets, HistogramReport, ReportSink};
use super::Sample;
use crate::config::MetricsConfig;
use crate::error::ConfigError;

// ─── Public types ────────────────────────────────────────────────

/// Per-request token handed out by `on_request_start` and consumed by
/// `on_request_end`. Lives exactly as long as the request it times.
#[derive(Debug)]
pub struct RequestTiming {
    started_at: Instant,
    route: String,
    method: String,
}

impl RequestTiming {
    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn method(&self) -> &str {
        &self.method
    }
}

/// Request metrics collector plus its reporting policy.
///
/// Owns the sample window, the per-route and global completion counters,
/// and the budget thresholds. The request pipeline holds an
/// `Arc<RequestMetrics>` and calls the hooks directly; nothing here is
/// process-global.
pub struct RequestMetrics {
    config: MetricsConfig,
    collector: MetricsCollector,
    gauge: FallbackGauge,
    sink: Arc<dyn ReportSink>,
    counters: Mutex<Counters>,
    shut_down: AtomicBool,
}

// ─── Internal state ──────────────────────────────────────────────

/// Completion counts since startup. Only ever incremented.
#[derive(Default)]
struct Counters {
    total: u64,
    per_route: HashMap<String, u64>,
}

/// What one completion has to report, decided under the counter lock.
struct Cadence {
    route_hit: bool,
    global_hit: bool,
}

// ─── RequestMetrics impl ─────────────────────────────────────────

impl RequestMetrics {
    /// Collector reading the process's own resident memory.
    pub fn new(config: MetricsConfig, sink: Arc<dyn ReportSink>) -> Result<Self, ConfigError> {
        Self::with_gauge(config, sink, Box::new(ProcessMemory))
    }

    pub fn with_gauge(
        config: MetricsConfig,
        sink: Arc<dyn ReportSink>,
        gauge: Box<dyn MemoryGauge>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let collector =
            MetricsCollector::new(config.window_capacity, config.histogram_buckets_ms.clone())?;

        Ok(Self {
            config,
            collector,
            gauge: FallbackGauge::new(gauge),
            sink,
            counters: Mutex::new(Counters::default()),
            shut_down: AtomicBool::new(false),
        })
    }

    /// Request entry hook. `route` must already be the route pattern.
    pub fn on_request_start(
        &self,
        route: impl Into<String>,
        method: impl Into<String>,
    ) -> RequestTiming {
        RequestTiming {
            started_at: Instant::now(),
            route: route.into(),
            method: method.into(),
        }
    }

    /// Response-sent hook. Measures the request, hands the sample to
    /// `record` and returns the measured time. Never fails.
    pub fn on_request_end(&self, timing: RequestTiming) -> Duration {
        let elapsed = timing.started_at.elapsed();
        let duration_ms = elapsed.as_secs_f64() * 1000.0;
        let memory_mb = self.gauge.read_mb();

        self.record(Sample {
            route: timing.route,
            method: timing.method,
            duration_ms,
            memory_mb,
        });
        elapsed
    }

    /// Stores an already-measured sample, then runs the budget check and
    /// the per-route / global report cadence.
    pub fn record(&self, sample: Sample) {
        let Sample {
            route,
            method,
            duration_ms,
            memory_mb,
        } = sample;

        self.collector.observe(Sample {
            route: route.clone(),
            method: method.clone(),
            duration_ms,
            memory_mb,
        });

        let cadence = self.count_completion(&route);

        let latency_budget = self.latency_budget(&method);
        let budgets = Budgets {
            latency_ms: latency_budget,
            memory_mb: self.config.memory_budget_mb,
        };

        if duration_ms > latency_budget || memory_mb > self.config.memory_budget_mb {
            self.sink.budget_exceeded(BudgetWarning {
                route: route.clone(),
                method: method.clone(),
                duration_ms,
                memory_mb,
                budgets,
            });
        }

        if cadence.route_hit {
            let snapshot = self.collector.snapshot(Some(&route));
            self.sink
                .histogram(HistogramReport::for_route(route, method, budgets, snapshot));
        }

        if cadence.global_hit {
            self.emit_global();
        }
    }

    /// Flushes one last global report if anything was ever recorded.
    /// Only the first call does anything; returns whether a report went out.
    pub fn shutdown(&self) -> bool {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return false;
        }

        let total = self.counters.lock().total;
        info!(
            total_requests = total,
            window = self.collector.sample_count(),
            "Flushing request metrics"
        );
        if total == 0 {
            return false;
        }
        self.emit_global();
        true
    }

    /// Read-only view for diagnostics.
    pub fn snapshot(&self, route: Option<&str>) -> MetricsSnapshot {
        self.collector.snapshot(route)
    }

    pub fn collector(&self) -> &MetricsCollector {
        &self.collector
    }

    /// Completed requests since startup.
    pub fn total_requests(&self) -> u64 {
        self.counters.lock().total
    }

    /// Completed requests for one route since startup.
    pub fn route_requests(&self, route: &str) -> u64 {
        self.counters
            .lock()
            .per_route
            .get(route)
            .copied()
            .unwrap_or(0)
    }

    /// Read-like methods get the tighter budget.
    pub fn latency_budget(&self, method: &str) -> f64 {
        if is_read_method(method) {
            self.config.read_budget_ms
        } else {
            self.config.write_budget_ms
        }
    }

    // ── Helpers ─────────────────────────────────────────────────

    fn count_completion(&self, route: &str) -> Cadence {
        let interval = self.config.log_interval;
        let mut counters = self.counters.lock();

        counters.total += 1;
        let total = counters.total;

        let route_count = match counters.per_route.get_mut(route) {
            Some(count) => {
                *count += 1;
                *count
            }
            None => {
                counters.per_route.insert(route.to_owned(), 1);
                1
            }
        };

        Cadence {
            route_hit: is_cadence_hit(route_count, interval),
            global_hit: is_cadence_hit(total, interval),
        }
    }

    /// Global reports always cite the write latency budget, whatever mix of
    /// methods the window holds.
    fn emit_global(&self) {
        let budgets = Budgets {
            latency_ms: self.config.write_budget_ms,
            memory_mb: self.config.memory_budget_mb,
        };
        self.sink
            .histogram(HistogramReport::global(budgets, self.collector.snapshot(None)));
    }
}

/// First completion, then every `interval`-th.
fn is_cadence_hit(count: u64, interval: u64) -> bool {
    count == 1 || count % interval == 0
}

fn is_read_method(method: &str) -> bool {
    method.eq_ignore_ascii_case("GET") || method.eq_ignore_ascii_case("HEAD")
}
