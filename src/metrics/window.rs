//! Trailing time window of band records.

use std::collections::VecDeque;
use std::time::Duration;

use crate::record::BandRecord;

/// Per-band arithmetic means over the retained window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandMeans {
    pub delta: f64,
    pub theta: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

/// Window of band records ordered by arrival, pruned by age.
///
/// Eviction is eager: every push drops the entries that fell outside the
/// window relative to the new record's timestamp, so the retained set
/// always satisfies `newest - entry <= window`.
#[derive(Debug)]
pub struct RecordWindow {
    entries: VecDeque<BandRecord>,
    window: Duration,
}

impl RecordWindow {
    /// Create an empty window spanning `window` of trailing time
    pub fn new(window: Duration) -> Self {
        Self {
            entries: VecDeque::new(),
            window,
        }
    }

    /// Append a record and evict everything strictly older than the window
    /// relative to the new record's timestamp.
    pub fn push(&mut self, record: BandRecord) {
        let newest = record.timestamp;
        self.entries.push_back(record);

        let window_micros = self.window.as_micros().min(i64::MAX as u128) as i64;
        while let Some(front) = self.entries.front() {
            let age = newest
                .signed_duration_since(front.timestamp)
                .num_microseconds()
                .unwrap_or(i64::MAX);
            if age > window_micros {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    /// Number of retained records
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the window is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Window span
    pub fn span(&self) -> Duration {
        self.window
    }

    /// Per-band means over all retained records; `None` when empty.
    pub fn means(&self) -> Option<BandMeans> {
        if self.entries.is_empty() {
            return None;
        }

        let n = self.entries.len() as f64;
        let mut sums = [0.0f64; 5];
        for record in &self.entries {
            for (sum, value) in sums.iter_mut().zip(record.values()) {
                *sum += value;
            }
        }

        Some(BandMeans {
            delta: sums[0] / n,
            theta: sums[1] / n,
            alpha: sums[2] / n,
            beta: sums[3] / n,
            gamma: sums[4] / n,
        })
    }

    /// Drop all retained records
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
