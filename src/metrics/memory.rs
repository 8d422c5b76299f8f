//! Resident memory gauge.
//!
//! The reading is process-wide and only approximates the cost of a single
//! request. A failed read never reaches the request path: the gauge falls
//! back to the last good value, or `0.0` before the first one.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

/// Source of the process resident set size, in megabytes.
pub trait MemoryGauge: Send + Sync {
    /// `None` when the platform or runtime cannot provide a reading.
    fn resident_mb(&self) -> Option<f64>;
}

/// Reads `VmRSS` from `/proc/self/status` on Linux. Other platforms report
/// no reading.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessMemory;

#[cfg(target_os = "linux")]
const PROC_STATUS_PATH: &str = "/proc/self/status";

impl MemoryGauge for ProcessMemory {
    #[cfg(target_os = "linux")]
    fn resident_mb(&self) -> Option<f64> {
        let status = std::fs::read_to_string(PROC_STATUS_PATH).ok()?;
        parse_vm_rss_mb(&status)
    }

    #[cfg(not(target_os = "linux"))]
    fn resident_mb(&self) -> Option<f64> {
        None
    }
}

/// Extracts `VmRSS` (reported in kB) from a `/proc/<pid>/status` body.
pub fn parse_vm_rss_mb(status: &str) -> Option<f64> {
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let mut fields = line["VmRSS:".len()..].split_whitespace();
    let value: f64 = fields.next()?.parse().ok()?;
    match fields.next() {
        Some("kB") | None => Some(value / 1024.0),
        Some(unit) => {
            debug!("Unexpected VmRSS unit {unit}");
            None
        }
    }
}

/// Wraps a gauge and remembers its last successful reading.
pub struct FallbackGauge {
    inner: Box<dyn MemoryGauge>,
    // f64 bits of the last good reading
    last_mb: AtomicU64,
}

impl FallbackGauge {
    pub fn new(inner: Box<dyn MemoryGauge>) -> Self {
        Self {
            inner,
            last_mb: AtomicU64::new(0.0_f64.to_bits()),
        }
    }

    /// Current reading, never failing.
    pub fn read_mb(&self) -> f64 {
        match self.inner.resident_mb() {
            Some(mb) if mb.is_finite() && mb >= 0.0 => {
                self.last_mb.store(mb.to_bits(), Ordering::Relaxed);
                mb
            }
            _ => {
                let last = f64::from_bits(self.last_mb.load(Ordering::Relaxed));
                debug!(fallback_mb = last, "Resident memory unavailable, using fallback");
                last
            }
        }
    }
}
