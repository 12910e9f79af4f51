//! # Muselog - EEG band stream ingestion and durable logging
//!
//! Core pipeline for monitoring a Muse headset (or any sensor speaking the
//! same addressed-message convention): it reassembles the fragmented
//! five-band element stream into complete records, computes ratio metrics
//! over a trailing time window, and persists raw samples, band records,
//! and metrics to rotating CSV logs.
//!
//! ## Overview
//!
//! The network library delivering messages, the charting frontend, and
//! process startup all live outside this crate; what lives here is the
//! part with real state and concurrency: the assembler state machine, the
//! windowed metrics engine, the buffered rotating writers, and the routing
//! that ties them together.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chrono::Utc;
//! use muselog::{Arg, MonitorConfig, NullSink, Pipeline};
//!
//! # fn main() -> muselog::Result<()> {
//! let config = MonitorConfig::with_log_dir("logs");
//! let pipeline = Pipeline::new(config, Arc::new(NullSink))?;
//!
//! // The message router calls this once per inbound message.
//! pipeline.handle(
//!     "/muse/eeg",
//!     &[Arg::Float(843.2), Arg::Float(812.5)],
//!     Utc::now(),
//! );
//!
//! // A periodic driver bounds data loss between buffer-full flushes.
//! pipeline.flush_all()?;
//!
//! // On shutdown, after the router stops delivering:
//! pipeline.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//!  message router (external)
//!        │ handle(address, args, timestamp)
//!        ▼
//!  ┌───────────────────────────────────────────────┐
//!  │ Pipeline                                      │
//!  │   /muse/eeg ──────────────► raw LogWriter     │
//!  │   /muse/elements/<band>                       │
//!  │        │                                      │
//!  │        ▼                                      │
//!  │   BandAssembler ─► BandRecord ─► band         │
//!  │        │                         LogWriter    │
//!  │        ▼                                      │
//!  │   MetricsEngine ─► MetricRecord ─► metrics    │
//!  │                                    LogWriter  │
//!  └───────────────┬───────────────────────────────┘
//!                  │ (timestamp, vector) per record
//!                  ▼
//!          visualization sink (external)
//! ```
//!
//! ## Modules
//!
//! - [`record`]: record types and the band enumeration
//! - [`message`]: inbound argument type
//! - [`assembler`]: token-to-record reassembly state machine
//! - [`metrics`]: trailing window and ratio computation
//! - [`writer`]: buffered, rotating CSV log writer
//! - [`pipeline`]: routing and fan-out
//! - [`registry`]: listener lifecycle bookkeeping
//! - [`sink`]: outbound visualization interface

pub mod assembler;
pub mod config;
pub mod error;
pub mod message;
pub mod metrics;
pub mod pipeline;
pub mod record;
pub mod registry;
pub mod sink;
pub mod writer;

// Re-exports for convenient access
pub use assembler::{AssemblerStats, BandAssembler, IgnoreReason, TokenOutcome};
pub use config::{MonitorConfig, WriterConfig};
pub use error::{MonitorError, Result, WriterError};
pub use message::Arg;
pub use metrics::{BandMeans, MetricsEngine, MetricsStats, RecordWindow};
pub use pipeline::{Pipeline, PipelineStats};
pub use record::{Band, BandRecord, MetricRecord, RawSample};
pub use registry::{ListenerFactory, ListenerHandle, ListenerRegistry};
pub use sink::{NullSink, VisualSink};
pub use writer::LogWriter;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
