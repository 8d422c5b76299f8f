use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::Serialize;

use super::percentiles::{nearest_rank, LatencyHistogram};
use super::Sample;
use crate::config::validate_buckets;
use crate::error::ConfigError;

// ─── Public types ────────────────────────────────────────────────

/// Bounded, FIFO-evicting window of recent request samples.
/// The middleware pushes through `observe()`, reports and the diagnostics
/// endpoints read through `snapshot()`.
pub struct MetricsCollector {
    capacity: usize,
    buckets_ms: Vec<f64>,
    samples: Mutex<VecDeque<Sample>>,
}

/// Statistics derived from the current window. Recomputed on every call,
/// never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub count: usize,
    pub p50_duration_ms: f64,
    pub p95_duration_ms: f64,
    pub max_duration_ms: f64,
    /// Worst resident memory reading in the window, not an average.
    pub memory_mb: f64,
    pub histogram: LatencyHistogram,
}

impl MetricsSnapshot {
    /// All-zero placeholder with every histogram bucket present.
    pub fn empty(buckets_ms: &[f64]) -> Self {
        Self {
            count: 0,
            p50_duration_ms: 0.0,
            p95_duration_ms: 0.0,
            max_duration_ms: 0.0,
            memory_mb: 0.0,
            histogram: LatencyHistogram::empty(buckets_ms),
        }
    }
}

// ─── MetricsCollector impl ───────────────────────────────────────

impl MetricsCollector {
    /// Builds an empty window. Fails on a zero capacity or malformed bucket
    /// boundaries.
    pub fn new(capacity: usize, buckets_ms: Vec<f64>) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        validate_buckets(&buckets_ms)?;

        Ok(Self {
            capacity,
            buckets_ms,
            samples: Mutex::new(VecDeque::with_capacity(capacity + 1)),
        })
    }

    /// Appends a sample, evicting the oldest one once over capacity.
    pub fn observe(&self, sample: Sample) {
        let mut samples = self.samples.lock();
        samples.push_back(sample);
        if samples.len() > self.capacity {
            samples.pop_front();
        }
    }

    /// Snapshot over the whole window, or only the samples whose route
    /// equals `route`.
    pub fn snapshot(&self, route: Option<&str>) -> MetricsSnapshot {
        // Copy out the two columns we need, then sort outside the lock.
        let (mut durations, memory_mb) = {
            let samples = self.samples.lock();
            let mut durations = Vec::with_capacity(samples.len());
            let mut memory_mb = 0.0_f64;
            for s in samples
                .iter()
                .filter(|s| route.map_or(true, |r| s.route == r))
            {
                durations.push(s.duration_ms);
                memory_mb = memory_mb.max(s.memory_mb);
            }
            (durations, memory_mb)
        };

        if durations.is_empty() {
            return MetricsSnapshot::empty(&self.buckets_ms);
        }

        durations.sort_by(f64::total_cmp);

        MetricsSnapshot {
            count: durations.len(),
            p50_duration_ms: nearest_rank(&durations, 0.5),
            p95_duration_ms: nearest_rank(&durations, 0.95),
            max_duration_ms: durations[durations.len() - 1],
            memory_mb,
            histogram: LatencyHistogram::from_durations(&self.buckets_ms, &durations),
        }
    }

    /// Samples currently held, at most `capacity()`.
    pub fn sample_count(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Window contents, oldest first.
    pub fn samples(&self) -> Vec<Sample> {
        self.samples.lock().iter().cloned().collect()
    }
}
