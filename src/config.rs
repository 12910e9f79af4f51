//! Configuration types for muselog

use std::path::PathBuf;
use std::time::Duration;

/// Top-level monitor configuration
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Directory receiving all log files (created if absent)
    pub log_dir: PathBuf,

    /// Address prefix of the raw sample stream
    pub raw_prefix: String,

    /// Address prefix of the per-band element stream
    pub elements_prefix: String,

    /// Column names of the raw sample log
    pub raw_fields: Vec<String>,

    /// Trailing window over which metrics are computed; also the minimum
    /// interval between two metric computations
    pub window: Duration,

    /// Records buffered in memory before an automatic flush
    pub buffer_capacity: usize,

    /// Active file size beyond which the next flush rotates to a new file
    pub rotate_bytes: u64,

    /// Hard ceiling on records retained across failed flushes
    pub max_retained: usize,

    /// Interval of the periodic flush driver
    pub flush_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            raw_prefix: "/muse/eeg".to_string(),
            elements_prefix: "/muse/elements/".to_string(),
            raw_fields: ["TP9", "Fp1", "Fp2", "TP10", "DRL", "REF"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            window: Duration::from_secs(10),
            buffer_capacity: 100,
            rotate_bytes: 10 * 1024 * 1024,
            max_retained: 1000,
            flush_interval: Duration::from_secs(5),
        }
    }
}

impl MonitorConfig {
    /// Create a configuration writing under the given directory
    pub fn with_log_dir(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            ..Default::default()
        }
    }

    /// Create a configuration with a custom metrics window
    pub fn with_window(window: Duration) -> Self {
        Self {
            window,
            ..Default::default()
        }
    }
}

/// Per-writer configuration
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// File name prefix for this log stream
    pub prefix: String,

    /// Column names written after `timestamp` in the header row
    pub fields: Vec<String>,

    /// Directory receiving the files
    pub dir: PathBuf,

    /// Records buffered in memory before an automatic flush
    pub buffer_capacity: usize,

    /// Active file size beyond which the next flush rotates
    pub rotate_bytes: u64,

    /// Hard ceiling on records retained across failed flushes
    pub max_retained: usize,
}

impl WriterConfig {
    /// Create a configuration with default sizing
    pub fn new(prefix: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            prefix: prefix.into(),
            fields,
            dir: PathBuf::from("logs"),
            buffer_capacity: 100,
            rotate_bytes: 10 * 1024 * 1024,
            max_retained: 1000,
        }
    }

    /// Set the target directory
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    /// Set the in-memory buffer capacity
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Set the rotation threshold in bytes
    pub fn with_rotate_bytes(mut self, bytes: u64) -> Self {
        self.rotate_bytes = bytes;
        self
    }
}
