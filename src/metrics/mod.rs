//! Windowed ratio metrics
//!
//! Maintains a trailing time window of [`BandRecord`]s and derives the five
//! ratio metrics (bar, hai, tar, tbr, wi) from per-band means, at most once
//! per window period.
//!
//! [`BandRecord`]: crate::record::BandRecord

mod engine;
mod window;

pub use engine::{MetricsEngine, MetricsStats};
pub use window::{BandMeans, RecordWindow};
