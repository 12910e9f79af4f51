//! Outbound interface to the visualization collaborator
//!
//! Rendering lives outside this crate. The pipeline pushes every completed
//! record as a `(timestamp, ordered vector)` pair; implementations are
//! expected to be cheap and non-blocking, since they run on the ingestion
//! path.

use chrono::{DateTime, Utc};

/// Receives completed records as timestamped numeric vectors.
pub trait VisualSink: Send + Sync {
    /// A raw sample vector, one entry per message argument.
    fn push_raw(&self, timestamp: DateTime<Utc>, values: &[f64]);

    /// A completed band record: delta, theta, alpha, beta, gamma.
    fn push_bands(&self, timestamp: DateTime<Utc>, values: &[f64; 5]);

    /// A metric record: bar, hai, tar, tbr, wi. Undefined entries are
    /// `f64::NAN`.
    fn push_metrics(&self, timestamp: DateTime<Utc>, values: &[f64; 5]);
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl VisualSink for NullSink {
    fn push_raw(&self, _timestamp: DateTime<Utc>, _values: &[f64]) {}

    fn push_bands(&self, _timestamp: DateTime<Utc>, _values: &[f64; 5]) {}

    fn push_metrics(&self, _timestamp: DateTime<Utc>, _values: &[f64; 5]) {}
}
