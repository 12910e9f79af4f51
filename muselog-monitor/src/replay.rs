// Muselog Monitor - Session replay engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Session replay engine.
//!
//! Replays a captured message session through the pipeline: one CSV row
//! per inbound message (`timestamp_ms,address,arg0,arg1,...`, argument
//! count varies per row), paced by the captured timestamps scaled with a
//! speed multiplier. Records keep their original capture times, so the
//! metrics window computes on the session's own schedule.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use muselog::{Arg, Pipeline};
use tokio::time::sleep;
use tracing::{info, warn};

/// Configuration for session replay.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Path to the session CSV file.
    pub csv_path: String,
    /// Replay speed multiplier (1.0 = real-time, 10.0 = 10x faster).
    pub speed: f64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            csv_path: String::new(),
            speed: 1.0,
        }
    }
}

/// State of the replay engine.
#[derive(Debug, Default)]
pub struct ReplayState {
    /// Current position in the session (message index).
    pub position: AtomicUsize,
    /// Total messages in the session.
    pub total: AtomicUsize,
    /// Whether replay is running.
    pub running: AtomicBool,
}

/// One captured message.
#[derive(Debug, Clone)]
struct MessageRow {
    timestamp_ms: u64,
    address: String,
    args: Vec<Arg>,
}

/// Feeds a captured session through a [`Pipeline`] at configurable speed.
pub struct ReplayEngine {
    config: ReplayConfig,
    state: Arc<ReplayState>,
    rows: Vec<MessageRow>,
}

impl ReplayEngine {
    /// Create a replay engine from a session CSV file.
    pub fn from_csv(config: ReplayConfig) -> Result<Self, ReplayError> {
        if !(config.speed > 0.0) {
            return Err(ReplayError::InvalidSpeed(config.speed));
        }

        let path = Path::new(&config.csv_path);
        if !path.exists() {
            return Err(ReplayError::FileNotFound(config.csv_path.clone()));
        }

        let rows = Self::parse_csv(path)?;
        if rows.is_empty() {
            return Err(ReplayError::EmptySession);
        }

        let state = Arc::new(ReplayState::default());
        state.total.store(rows.len(), Ordering::SeqCst);

        Ok(Self {
            config,
            state,
            rows,
        })
    }

    /// Parse a session CSV file into message rows.
    ///
    /// The header must start with `timestamp_ms,address`; every following
    /// column is an argument. Rows carry however many arguments their
    /// message had, so the reader runs in flexible mode.
    fn parse_csv(path: &Path) -> Result<Vec<MessageRow>, ReplayError> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;

        let headers = reader.headers()?.clone();
        let header_strs: Vec<&str> = headers.iter().collect();
        if header_strs.len() < 2
            || header_strs[0] != "timestamp_ms"
            || header_strs[1] != "address"
        {
            return Err(ReplayError::InvalidFormat(
                "Header must start with 'timestamp_ms,address'".to_string(),
            ));
        }

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            let values: Vec<&str> = record.iter().collect();

            if values.len() < 2 {
                continue;
            }

            let timestamp_ms: u64 = values[0]
                .parse()
                .map_err(|_| ReplayError::InvalidFormat("Invalid timestamp".to_string()))?;

            let args = values[2..].iter().map(|s| parse_arg(s)).collect();

            rows.push(MessageRow {
                timestamp_ms,
                address: values[1].to_string(),
                args,
            });
        }

        Ok(rows)
    }

    /// Get the replay state.
    pub fn state(&self) -> Arc<ReplayState> {
        Arc::clone(&self.state)
    }

    /// Number of messages in the session.
    pub fn message_count(&self) -> usize {
        self.rows.len()
    }

    /// Replay the whole session through `pipeline` (runs until done or
    /// stopped).
    pub async fn run(&self, pipeline: &Pipeline) {
        self.state.running.store(true, Ordering::SeqCst);
        info!(
            "Starting replay: {} messages at {}x speed",
            self.rows.len(),
            self.config.speed
        );

        for (position, row) in self.rows.iter().enumerate() {
            if !self.state.running.load(Ordering::SeqCst) {
                break;
            }

            match DateTime::<Utc>::from_timestamp_millis(row.timestamp_ms as i64) {
                Some(timestamp) => pipeline.handle(&row.address, &row.args, timestamp),
                None => warn!("skipping message with unrepresentable timestamp"),
            }

            self.state.position.store(position + 1, Ordering::SeqCst);

            if let Some(next) = self.rows.get(position + 1) {
                let gap_ms = next.timestamp_ms.saturating_sub(row.timestamp_ms);
                let sleep_ms = (gap_ms as f64 / self.config.speed) as u64;
                if sleep_ms > 0 {
                    sleep(Duration::from_millis(sleep_ms)).await;
                }
            }
        }

        self.state.running.store(false, Ordering::SeqCst);
        info!(
            "Replay finished: {}/{} messages",
            self.state.position.load(Ordering::SeqCst),
            self.rows.len()
        );
    }

    /// Stop the replay.
    pub fn stop(&self) {
        self.state.running.store(false, Ordering::SeqCst);
    }
}

/// Parse one argument cell: integer, then float, then plain text.
fn parse_arg(s: &str) -> Arg {
    let trimmed = s.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        Arg::Int(i)
    } else if let Ok(f) = trimmed.parse::<f64>() {
        Arg::Float(f)
    } else {
        Arg::Str(trimmed.to_string())
    }
}

/// Replay errors.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Empty session")]
    EmptySession,

    #[error("Invalid speed: {0}")]
    InvalidSpeed(f64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
