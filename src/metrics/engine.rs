//! Rate-limited ratio metric computation.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::window::{BandMeans, RecordWindow};
use crate::record::{BandRecord, MetricRecord};

/// Counters for the metrics engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsStats {
    /// Band records observed (whether or not a computation was triggered)
    pub records_observed: u64,
    /// Metric records actually computed
    pub computations: u64,
}

/// Computes ratio metrics over a trailing window of band records.
///
/// Each call to [`process`](MetricsEngine::process) appends the record,
/// evicts entries older than the window, and computes a [`MetricRecord`]
/// at most once per window period. Gating is driven by record timestamps,
/// not by sample count, so replayed sessions compute on their original
/// schedule.
///
/// Not safe for concurrent use; callers serialize access (the pipeline
/// holds it behind a mutex).
#[derive(Debug)]
pub struct MetricsEngine {
    window: RecordWindow,
    period: Duration,
    last_computation: Option<DateTime<Utc>>,
    stats: MetricsStats,
}

impl MetricsEngine {
    /// Create an engine computing over (and at most once per) `period`
    pub fn new(period: Duration) -> Self {
        Self {
            window: RecordWindow::new(period),
            period,
            last_computation: None,
            stats: MetricsStats::default(),
        }
    }

    /// Observe a band record; returns a metric record when one is due.
    ///
    /// The first record always computes. After that, a computation happens
    /// only once the record's timestamp has advanced a full period past
    /// the previous computation.
    pub fn process(&mut self, record: &BandRecord) -> Option<MetricRecord> {
        self.stats.records_observed += 1;
        self.window.push(*record);

        let due = match self.last_computation {
            None => true,
            Some(last) => {
                let elapsed = record
                    .timestamp
                    .signed_duration_since(last)
                    .num_microseconds()
                    .unwrap_or(i64::MAX);
                elapsed >= self.period.as_micros().min(i64::MAX as u128) as i64
            }
        };
        if !due {
            return None;
        }

        // The window always holds at least the record just pushed.
        let means = self.window.means()?;
        let metric = Self::compute(record.timestamp, &means);

        self.last_computation = Some(record.timestamp);
        self.stats.computations += 1;
        Some(metric)
    }

    fn compute(timestamp: DateTime<Utc>, means: &BandMeans) -> MetricRecord {
        MetricRecord {
            timestamp,
            bar: ratio(means.beta, means.alpha),
            hai: ratio(means.beta + means.gamma, means.alpha),
            tar: ratio(means.theta, means.alpha),
            tbr: ratio(means.theta, means.beta),
            wi: ratio(means.delta + means.theta, means.alpha),
        }
    }

    /// Number of records currently retained in the window
    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Window/computation period
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Snapshot of the engine counters
    pub fn stats(&self) -> MetricsStats {
        self.stats
    }
}

/// A ratio, or `None` when the denominator mean is exactly zero.
fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn record(secs: i64, values: [f64; 5]) -> BandRecord {
        BandRecord::from_slots(at(secs), values)
    }

    #[test]
    fn test_first_record_computes() {
        let mut engine = MetricsEngine::new(Duration::from_secs(10));
        let metric = engine
            .process(&record(0, [1.0, 2.0, 2.0, 4.0, 6.0]))
            .expect("first record always computes");

        assert_relative_eq!(metric.bar.unwrap(), 2.0);
        assert_relative_eq!(metric.hai.unwrap(), 5.0);
        assert_relative_eq!(metric.tar.unwrap(), 1.0);
        assert_relative_eq!(metric.tbr.unwrap(), 0.5);
        assert_relative_eq!(metric.wi.unwrap(), 1.5);
        assert_eq!(engine.stats().computations, 1);
    }

    #[test]
    fn test_bar_over_window_means() {
        let mut engine = MetricsEngine::new(Duration::from_secs(60));
        // alpha means 2, beta means 4 across the two records.
        engine.process(&record(0, [0.0, 0.0, 2.0, 4.0, 0.0]));
        let metric = engine
            .process(&record(60, [0.0, 0.0, 2.0, 4.0, 0.0]))
            .expect("a full period elapsed");
        assert_relative_eq!(metric.bar.unwrap(), 2.0);
    }

    #[test]
    fn test_zero_alpha_mean_undefines_alpha_ratios() {
        let mut engine = MetricsEngine::new(Duration::from_secs(10));
        let metric = engine
            .process(&record(0, [1.0, 2.0, 0.0, 4.0, 6.0]))
            .expect("first record computes");

        assert!(metric.bar.is_none());
        assert!(metric.hai.is_none());
        assert!(metric.tar.is_none());
        assert!(metric.wi.is_none());
        // tbr divides by beta, which is non-zero here.
        assert_relative_eq!(metric.tbr.unwrap(), 0.5);
    }

    #[test]
    fn test_zero_beta_mean_undefines_tbr_only() {
        let mut engine = MetricsEngine::new(Duration::from_secs(10));
        let metric = engine
            .process(&record(0, [1.0, 2.0, 2.0, 0.0, 6.0]))
            .expect("first record computes");

        assert!(metric.tbr.is_none());
        assert_relative_eq!(metric.bar.unwrap(), 0.0);
        assert_relative_eq!(metric.hai.unwrap(), 3.0);
    }

    #[test]
    fn test_rate_limited_within_period() {
        let mut engine = MetricsEngine::new(Duration::from_secs(10));
        assert!(engine.process(&record(0, [1.0; 5])).is_some());
        assert!(engine.process(&record(4, [1.0; 5])).is_none());
        assert!(engine.process(&record(9, [1.0; 5])).is_none());
        assert!(engine.process(&record(10, [1.0; 5])).is_some());
        assert_eq!(engine.stats().records_observed, 4);
        assert_eq!(engine.stats().computations, 2);
    }

    #[test]
    fn test_gate_is_last_computation_not_sample_count() {
        let mut engine = MetricsEngine::new(Duration::from_secs(10));
        assert!(engine.process(&record(0, [1.0; 5])).is_some());
        // Many samples, none past the gate.
        for secs in 1..10 {
            assert!(engine.process(&record(secs, [1.0; 5])).is_none());
        }
        assert!(engine.process(&record(12, [1.0; 5])).is_some());
    }

    #[test]
    fn test_window_evicts_old_records_from_means() {
        let mut engine = MetricsEngine::new(Duration::from_secs(10));
        engine.process(&record(0, [0.0, 0.0, 8.0, 8.0, 0.0]));
        // 30s later the first record is long gone; means come from the new
        // record alone.
        let metric = engine
            .process(&record(30, [0.0, 0.0, 2.0, 4.0, 0.0]))
            .expect("gate elapsed");
        assert_eq!(engine.window_len(), 1);
        assert_relative_eq!(metric.bar.unwrap(), 2.0);
    }
}
