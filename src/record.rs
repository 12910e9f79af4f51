//! Record types flowing through the pipeline
//!
//! Three record kinds are persisted and pushed to the visualization
//! collaborator: ephemeral [`RawSample`]s, reconstructed [`BandRecord`]s,
//! and computed [`MetricRecord`]s. All carry an arrival timestamp and know
//! how to render themselves as a CSV row and as an ordered numeric vector.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One of the five frequency bands of a reconstructed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Band {
    Delta,
    Theta,
    Alpha,
    Beta,
    Gamma,
}

impl Band {
    /// Number of bands in a complete record
    pub const COUNT: usize = 5;

    /// All bands in canonical record order
    pub const ALL: [Band; Band::COUNT] = [
        Band::Delta,
        Band::Theta,
        Band::Alpha,
        Band::Beta,
        Band::Gamma,
    ];

    /// Parse the name carried on element addresses (`delta_absolute`, ...)
    pub fn from_wire_name(name: &str) -> Option<Self> {
        match name {
            "delta_absolute" => Some(Band::Delta),
            "theta_absolute" => Some(Band::Theta),
            "alpha_absolute" => Some(Band::Alpha),
            "beta_absolute" => Some(Band::Beta),
            "gamma_absolute" => Some(Band::Gamma),
            _ => None,
        }
    }

    /// Short lowercase name used in CSV headers
    pub fn name(&self) -> &'static str {
        match self {
            Band::Delta => "delta",
            Band::Theta => "theta",
            Band::Alpha => "alpha",
            Band::Beta => "beta",
            Band::Gamma => "gamma",
        }
    }

    /// Fixed slot index in the canonical order
    pub fn index(&self) -> usize {
        match self {
            Band::Delta => 0,
            Band::Theta => 1,
            Band::Alpha => 2,
            Band::Beta => 3,
            Band::Gamma => 4,
        }
    }
}

/// Timestamp rendering shared by all CSV rows (RFC 3339, microseconds).
pub(crate) fn csv_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// A raw sample as delivered by the message router.
///
/// Produced per inbound raw message and consumed immediately; nothing holds
/// on to these after the write/push fan-out.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    /// Address the message arrived on
    pub address: String,
    /// Numeric arguments in wire order
    pub values: Vec<f64>,
    /// Arrival timestamp
    pub timestamp: DateTime<Utc>,
}

impl RawSample {
    /// Create a raw sample
    pub fn new(address: impl Into<String>, values: Vec<f64>, timestamp: DateTime<Utc>) -> Self {
        Self {
            address: address.into(),
            values,
            timestamp,
        }
    }

    /// CSV row: timestamp followed by the argument values
    pub fn csv_row(&self) -> String {
        let mut row = csv_timestamp(self.timestamp);
        for value in &self.values {
            row.push(',');
            row.push_str(&value.to_string());
        }
        row
    }
}

/// A complete five-band record reconstructed from the element stream.
///
/// Emitted only by the assembler once all five bands have been observed in
/// one cycle; immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandRecord {
    /// Arrival timestamp of the completing token
    pub timestamp: DateTime<Utc>,
    pub delta: f64,
    pub theta: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl BandRecord {
    /// Build a record from values in canonical band order
    pub fn from_slots(timestamp: DateTime<Utc>, values: [f64; Band::COUNT]) -> Self {
        Self {
            timestamp,
            delta: values[0],
            theta: values[1],
            alpha: values[2],
            beta: values[3],
            gamma: values[4],
        }
    }

    /// Values in canonical band order
    pub fn values(&self) -> [f64; Band::COUNT] {
        [self.delta, self.theta, self.alpha, self.beta, self.gamma]
    }

    /// Value of a single band
    pub fn value(&self, band: Band) -> f64 {
        self.values()[band.index()]
    }

    /// CSV row: timestamp, delta, theta, alpha, beta, gamma
    pub fn csv_row(&self) -> String {
        let mut row = csv_timestamp(self.timestamp);
        for value in self.values() {
            row.push(',');
            row.push_str(&value.to_string());
        }
        row
    }
}

/// Ratio metrics computed over the trailing window of band records.
///
/// Each ratio is `None` when its denominator mean was exactly zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Timestamp of the band record that triggered the computation
    pub timestamp: DateTime<Utc>,
    /// Beta / alpha ratio
    pub bar: Option<f64>,
    /// (Beta + gamma) / alpha ratio
    pub hai: Option<f64>,
    /// Theta / alpha ratio
    pub tar: Option<f64>,
    /// Theta / beta ratio
    pub tbr: Option<f64>,
    /// (Delta + theta) / alpha ratio
    pub wi: Option<f64>,
}

impl MetricRecord {
    /// Metric names in record order, as used in CSV headers
    pub const NAMES: [&'static str; 5] = ["bar", "hai", "tar", "tbr", "wi"];

    /// Values in record order; undefined entries are `f64::NAN`
    pub fn values(&self) -> [f64; 5] {
        [
            self.bar.unwrap_or(f64::NAN),
            self.hai.unwrap_or(f64::NAN),
            self.tar.unwrap_or(f64::NAN),
            self.tbr.unwrap_or(f64::NAN),
            self.wi.unwrap_or(f64::NAN),
        ]
    }

    /// CSV row: timestamp then the five ratios; undefined entries render
    /// as empty cells
    pub fn csv_row(&self) -> String {
        let mut row = csv_timestamp(self.timestamp);
        for value in [self.bar, self.hai, self.tar, self.tbr, self.wi] {
            row.push(',');
            if let Some(v) = value {
                row.push_str(&v.to_string());
            }
        }
        row
    }
}
