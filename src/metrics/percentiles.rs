use serde::ser::{Serialize, SerializeMap, Serializer};

/// Nearest-rank selection over an ascending slice: the value at index
/// `floor(len * pct)`, clamped to the last element. No interpolation.
/// Returns `0.0` for an empty slice.
pub fn nearest_rank(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64 * pct).floor() as usize).min(sorted.len() - 1);
    sorted[idx]
}

/// Fixed-boundary latency histogram.
///
/// One bucket per boundary (`<=B`, inclusive upper bound) plus a trailing
/// overflow bucket (`>Bmax`). Every bucket is always present so consumers see
/// a stable shape; it serializes as an ordered JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencyHistogram {
    bounds_ms: Vec<f64>,
    /// `bounds_ms.len() + 1` entries, overflow last.
    counts: Vec<u64>,
}

impl LatencyHistogram {
    /// All-zero histogram over `bounds_ms` (ascending).
    pub fn empty(bounds_ms: &[f64]) -> Self {
        Self {
            bounds_ms: bounds_ms.to_vec(),
            counts: vec![0; bounds_ms.len() + 1],
        }
    }

    pub fn from_durations<'a>(
        bounds_ms: &[f64],
        durations: impl IntoIterator<Item = &'a f64>,
    ) -> Self {
        let mut hist = Self::empty(bounds_ms);
        for &d in durations {
            hist.record(d);
        }
        hist
    }

    /// Adds one duration to the smallest boundary `>= duration_ms`, or to the
    /// overflow bucket when it exceeds them all.
    pub fn record(&mut self, duration_ms: f64) {
        // partition_point yields the first boundary >= duration, or len()
        // (the overflow slot) when none qualifies.
        let idx = self.bounds_ms.partition_point(|b| *b < duration_ms);
        self.counts[idx] += 1;
    }

    /// Count for a bucket label such as `"<=50"` or `">500"`.
    pub fn get(&self, label: &str) -> Option<u64> {
        self.iter().find(|(l, _)| l == label).map(|(_, c)| c)
    }

    /// `(label, count)` pairs in boundary order, overflow last.
    pub fn iter(&self) -> impl Iterator<Item = (String, u64)> + '_ {
        let overflow = self.overflow_label();
        self.bounds_ms
            .iter()
            .map(|b| format!("<={b}"))
            .chain(std::iter::once(overflow))
            .zip(self.counts.iter().copied())
    }

    /// Number of buckets, overflow included.
    pub fn bucket_count(&self) -> usize {
        self.counts.len()
    }

    fn overflow_label(&self) -> String {
        match self.bounds_ms.last() {
            Some(max) => format!(">{max}"),
            None => ">0".to_string(),
        }
    }
}

impl Serialize for LatencyHistogram {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.counts.len()))?;
        for (label, count) in self.iter() {
            map.serialize_entry(&label, &count)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUCKETS: [f64; 5] = [25.0, 50.0, 100.0, 200.0, 500.0];

    #[test]
    fn nearest_rank_uses_floor_index() {
        let sorted = [10.0, 30.0, 60.0];
        assert_eq!(nearest_rank(&sorted, 0.5), 30.0);
        assert_eq!(nearest_rank(&sorted, 0.95), 60.0);
        assert_eq!(nearest_rank(&sorted, 1.0), 60.0);
        assert_eq!(nearest_rank(&sorted, 0.0), 10.0);
    }

    #[test]
    fn nearest_rank_on_even_and_empty_windows() {
        // floor(4 * 0.5) = 2 → upper median, not an interpolated 25.
        assert_eq!(nearest_rank(&[10.0, 20.0, 30.0, 40.0], 0.5), 30.0);
        assert_eq!(nearest_rank(&[], 0.5), 0.0);
        assert_eq!(nearest_rank(&[7.0], 0.95), 7.0);
    }

    #[test]
    fn empty_histogram_has_every_bucket() {
        let hist = LatencyHistogram::empty(&BUCKETS);
        let labels: Vec<String> = hist.iter().map(|(l, _)| l).collect();
        assert_eq!(labels, ["<=25", "<=50", "<=100", "<=200", "<=500", ">500"]);
        assert!(hist.iter().all(|(_, c)| c == 0));
        assert_eq!(hist.bucket_count(), 6);
        assert_eq!(hist.iter().map(|(_, c)| c).sum::<u64>(), 0);
    }

    #[test]
    fn boundary_values_are_inclusive() {
        let hist = LatencyHistogram::from_durations(&BUCKETS, &[25.0, 25.01, 500.0, 500.5]);
        assert_eq!(hist.get("<=25"), Some(1));
        assert_eq!(hist.get("<=50"), Some(1));
        assert_eq!(hist.get("<=500"), Some(1));
        assert_eq!(hist.get(">500"), Some(1));
        assert_eq!(hist.iter().map(|(_, c)| c).sum::<u64>(), 4);
    }

    #[test]
    fn zero_duration_lands_in_first_bucket() {
        let hist = LatencyHistogram::from_durations(&BUCKETS, &[0.0]);
        assert_eq!(hist.get("<=25"), Some(1));
    }

    #[test]
    fn fractional_boundaries_render_without_trailing_zeros() {
        let hist = LatencyHistogram::empty(&[0.5, 2.0]);
        let labels: Vec<String> = hist.iter().map(|(l, _)| l).collect();
        assert_eq!(labels, ["<=0.5", "<=2", ">2"]);
    }

    #[test]
    fn serializes_as_ordered_object() {
        let hist = LatencyHistogram::from_durations(&[10.0, 20.0], &[5.0, 15.0, 99.0]);
        let json = serde_json::to_string(&hist).unwrap();
        assert_eq!(json, r#"{"<=10":1,"<=20":1,">20":1}"#);
    }
}
