//! Command line / environment configuration.

use clap::Parser;

use crate::error::ConfigError;

/// Default histogram bucket boundaries in milliseconds.
pub const DEFAULT_HISTOGRAM_BUCKETS_MS: [f64; 5] = [25.0, 50.0, 100.0, 200.0, 500.0];

/// Metadata API command line arguments. Every flag can also be set through
/// the environment.
#[derive(Debug, Parser)]
#[command(name = "metadata-api")]
#[command(about = "Metadata graph API with request latency/memory budgets")]
pub struct Args {
    /// Interface to bind.
    #[arg(long, env = "API_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind.
    #[arg(long, env = "API_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Log filter directive, e.g. `info` or `metadata_api=debug`.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, env = "LOG_JSON", default_value_t = false)]
    pub log_json: bool,

    /// Number of recent requests kept for percentile/histogram snapshots.
    #[arg(long, env = "METRICS_WINDOW", default_value_t = 100)]
    pub metrics_window: usize,

    /// Log a histogram every N requests (per route and globally).
    #[arg(long, env = "METRICS_LOG_INTERVAL", default_value_t = 25)]
    pub metrics_log_interval: u64,

    /// Latency budget (ms) for read requests.
    #[arg(long, env = "READ_BUDGET_MS", default_value_t = 100.0)]
    pub read_budget_ms: f64,

    /// Latency budget (ms) for write requests.
    #[arg(long, env = "WRITE_BUDGET_MS", default_value_t = 200.0)]
    pub write_budget_ms: f64,

    /// Resident memory budget (MB).
    #[arg(long, env = "MEMORY_BUDGET_MB", default_value_t = 256.0)]
    pub memory_budget_mb: f64,

    /// Comma separated histogram bucket boundaries (ms).
    #[arg(
        long,
        env = "HISTOGRAM_BUCKETS",
        value_delimiter = ',',
        default_value = "25,50,100,200,500"
    )]
    pub histogram_buckets: Vec<f64>,

    /// Pending histogram reports buffered before new ones are dropped.
    #[arg(long, env = "REPORT_QUEUE", default_value_t = 1024)]
    pub report_queue: usize,
}

impl Args {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Settings for the request metrics collector and its reporting policy.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsConfig {
    /// Sample window capacity.
    pub window_capacity: usize,
    /// Cadence, in completed requests, of histogram reports.
    pub log_interval: u64,
    /// Latency budget for read-like methods.
    pub read_budget_ms: f64,
    /// Latency budget for every other method.
    pub write_budget_ms: f64,
    /// Resident memory budget.
    pub memory_budget_mb: f64,
    /// Ascending histogram boundaries.
    pub histogram_buckets_ms: Vec<f64>,
    /// Depth of the non-blocking report queue.
    pub report_queue: usize,
}

impl MetricsConfig {
    /// Checks every setting, returning the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.log_interval == 0 {
            return Err(ConfigError::ZeroLogInterval);
        }
        for (name, value) in [
            ("read latency", self.read_budget_ms),
            ("write latency", self.write_budget_ms),
            ("memory", self.memory_budget_mb),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidBudget { name, value });
            }
        }
        validate_buckets(&self.histogram_buckets_ms)?;
        if self.report_queue == 0 {
            return Err(ConfigError::ZeroReportQueue);
        }
        Ok(())
    }
}

/// Boundaries must be non-empty, positive, finite and strictly ascending.
pub fn validate_buckets(bounds: &[f64]) -> Result<(), ConfigError> {
    if bounds.is_empty() {
        return Err(ConfigError::EmptyBuckets);
    }
    let well_formed = bounds.iter().all(|b| b.is_finite() && *b > 0.0)
        && bounds.windows(2).all(|w| w[0] < w[1]);
    if !well_formed {
        return Err(ConfigError::UnorderedBuckets(bounds.to_vec()));
    }
    Ok(())
}

impl From<&Args> for MetricsConfig {
    fn from(args: &Args) -> Self {
        Self {
            window_capacity: args.metrics_window,
            log_interval: args.metrics_log_interval,
            read_budget_ms: args.read_budget_ms,
            write_budget_ms: args.write_budget_ms,
            memory_budget_mb: args.memory_budget_mb,
            histogram_buckets_ms: args.histogram_buckets.clone(),
            report_queue: args.report_queue,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            window_capacity: 100,
            log_interval: 25,
            read_budget_ms: 100.0,
            write_budget_ms: 200.0,
            memory_budget_mb: 256.0,
            histogram_buckets_ms: DEFAULT_HISTOGRAM_BUCKETS_MS.to_vec(),
            report_queue: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(MetricsConfig::default().validate(), Ok(()));
    }

    #[test]
    fn args_defaults_match_config_defaults() {
        let args = Args::parse_from(["metadata-api"]);
        assert_eq!(MetricsConfig::from(&args), MetricsConfig::default());
        assert_eq!(args.listen_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn bucket_list_parses_from_comma_separated_flag() {
        let args = Args::parse_from(["metadata-api", "--histogram-buckets", "10,20.5,40"]);
        assert_eq!(args.histogram_buckets, vec![10.0, 20.5, 40.0]);
    }

    #[test]
    fn rejects_zero_capacity_and_interval() {
        let cfg = MetricsConfig {
            window_capacity: 0,
            ..MetricsConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroCapacity));

        let cfg = MetricsConfig {
            log_interval: 0,
            ..MetricsConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroLogInterval));
    }

    #[test]
    fn rejects_bad_budgets() {
        let cfg = MetricsConfig {
            memory_budget_mb: -1.0,
            ..MetricsConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidBudget { name: "memory", .. })
        ));

        let cfg = MetricsConfig {
            read_budget_ms: f64::NAN,
            ..MetricsConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidBudget { name: "read latency", .. })
        ));
    }

    #[test]
    fn rejects_unordered_or_empty_buckets() {
        assert_eq!(validate_buckets(&[]), Err(ConfigError::EmptyBuckets));
        assert!(validate_buckets(&[50.0, 25.0]).is_err());
        assert!(validate_buckets(&[25.0, 25.0]).is_err());
        assert!(validate_buckets(&[0.0, 25.0]).is_err());
        assert!(validate_buckets(&[25.0, f64::INFINITY]).is_err());
        assert!(validate_buckets(&[1.0, 2.0]).is_ok());
    }
}
