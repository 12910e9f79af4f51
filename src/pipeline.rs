//! Message routing and record fan-out
//!
//! [`Pipeline`] is the top of the ingestion path. The external message
//! router calls [`handle`](Pipeline::handle) once per inbound message,
//! possibly from several delivery threads at once; the pipeline routes by
//! address, drives the assembler and metrics engine, and fans completed
//! records out to the log writers and the visualization sink.
//!
//! Per-message failures never propagate: malformed input is dropped and
//! counted, write failures are logged and counted, and the next message is
//! processed normally.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::assembler::{AssemblerStats, BandAssembler, TokenOutcome};
use crate::config::{MonitorConfig, WriterConfig};
use crate::error::Result;
use crate::message::Arg;
use crate::metrics::{MetricsEngine, MetricsStats};
use crate::record::{Band, MetricRecord, RawSample};
use crate::sink::VisualSink;
use crate::writer::LogWriter;

/// Snapshot of the pipeline counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// Raw samples persisted and pushed
    pub raw_samples: u64,
    /// Band records completed by the assembler
    pub band_records: u64,
    /// Metric records computed
    pub metric_records: u64,
    /// Raw messages dropped over a non-numeric argument
    pub malformed_raw: u64,
    /// Messages whose address matched no route
    pub unhandled_messages: u64,
    /// Failed log writes (rows are retained by the writers for retry)
    pub write_errors: u64,
}

/// Routes inbound messages and fans completed records out to the writers,
/// the metrics engine, and the visualization sink.
pub struct Pipeline {
    config: MonitorConfig,
    assembler: Mutex<BandAssembler>,
    metrics: Mutex<MetricsEngine>,
    raw_writer: LogWriter,
    band_writer: LogWriter,
    metric_writer: LogWriter,
    sink: Arc<dyn VisualSink>,
    raw_samples: AtomicU64,
    band_records: AtomicU64,
    metric_records: AtomicU64,
    malformed_raw: AtomicU64,
    unhandled_messages: AtomicU64,
    write_errors: AtomicU64,
}

impl Pipeline {
    /// Build a pipeline with its three log writers.
    ///
    /// # Errors
    ///
    /// Writer construction failures (log directory uncreatable, file
    /// unopenable) are fatal and propagate; everything after construction
    /// degrades per message instead of failing.
    pub fn new(config: MonitorConfig, sink: Arc<dyn VisualSink>) -> Result<Self> {
        let raw_writer = LogWriter::create(writer_config(&config, "eeg", config.raw_fields.clone()))?;
        let band_writer = LogWriter::create(writer_config(
            &config,
            "channels",
            Band::ALL.iter().map(|b| b.name().to_string()).collect(),
        ))?;
        let metric_writer = LogWriter::create(writer_config(
            &config,
            "metrics",
            MetricRecord::NAMES.iter().map(|s| s.to_string()).collect(),
        ))?;

        Ok(Self {
            assembler: Mutex::new(BandAssembler::new()),
            metrics: Mutex::new(MetricsEngine::new(config.window)),
            raw_writer,
            band_writer,
            metric_writer,
            sink,
            config,
            raw_samples: AtomicU64::new(0),
            band_records: AtomicU64::new(0),
            metric_records: AtomicU64::new(0),
            malformed_raw: AtomicU64::new(0),
            unhandled_messages: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
        })
    }

    /// Handle one inbound message.
    ///
    /// Safe to call from several delivery threads at once; the assembler
    /// and metrics engine are serialized internally, and each writer locks
    /// only itself.
    pub fn handle(&self, address: &str, args: &[Arg], timestamp: DateTime<Utc>) {
        let is_raw = address.starts_with(&self.config.raw_prefix) && args.len() >= 2;
        if is_raw {
            self.handle_raw(address, args, timestamp);
        } else if let Some(suffix) = address.strip_prefix(&self.config.elements_prefix) {
            self.handle_element(suffix, args, timestamp);
        } else {
            self.unhandled_messages.fetch_add(1, Ordering::Relaxed);
            trace!("ignoring message at {}", address);
        }
    }

    fn handle_raw(&self, address: &str, args: &[Arg], timestamp: DateTime<Utc>) {
        let values: Option<Vec<f64>> = args.iter().map(Arg::as_f64).collect();
        let Some(values) = values else {
            self.malformed_raw.fetch_add(1, Ordering::Relaxed);
            debug!("dropping raw message at {} with non-numeric argument", address);
            return;
        };

        let sample = RawSample::new(address, values, timestamp);
        self.write_row(&self.raw_writer, sample.csv_row());
        self.sink.push_raw(timestamp, &sample.values);
        self.raw_samples.fetch_add(1, Ordering::Relaxed);
    }

    fn handle_element(&self, suffix: &str, args: &[Arg], timestamp: DateTime<Utc>) {
        let band = Band::from_wire_name(suffix.rsplit('/').next().unwrap_or(suffix));
        let token = Arg::join(args);

        let outcome = {
            let mut assembler = lock(&self.assembler);
            assembler.process(&token, band, timestamp)
        };

        let record = match outcome {
            TokenOutcome::Completed(record) => record,
            // Everything else is tracked by the assembler's own counters.
            _ => return,
        };

        self.band_records.fetch_add(1, Ordering::Relaxed);
        self.write_row(&self.band_writer, record.csv_row());
        self.sink.push_bands(record.timestamp, &record.values());

        let metric = {
            let mut metrics = lock(&self.metrics);
            metrics.process(&record)
        };

        if let Some(metric) = metric {
            self.metric_records.fetch_add(1, Ordering::Relaxed);
            self.write_row(&self.metric_writer, metric.csv_row());
            self.sink.push_metrics(metric.timestamp, &metric.values());
        }
    }

    fn write_row(&self, writer: &LogWriter, row: String) {
        if let Err(err) = writer.write(row) {
            self.write_errors.fetch_add(1, Ordering::Relaxed);
            warn!("{} log write failed: {}", writer.prefix(), err);
        }
    }

    /// Flush all three writers.
    ///
    /// Every writer is attempted even when an earlier one fails; the first
    /// failure is returned after the sweep.
    pub fn flush_all(&self) -> Result<()> {
        let mut first_error = None;
        for writer in [&self.raw_writer, &self.band_writer, &self.metric_writer] {
            if let Err(err) = writer.flush() {
                self.write_errors.fetch_add(1, Ordering::Relaxed);
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Drain all buffered records to disk.
    ///
    /// Called on shutdown, after the router has stopped delivering.
    pub fn shutdown(&self) -> Result<()> {
        debug!("draining log buffers");
        self.flush_all()
    }

    /// Snapshot of the pipeline counters
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            raw_samples: self.raw_samples.load(Ordering::Relaxed),
            band_records: self.band_records.load(Ordering::Relaxed),
            metric_records: self.metric_records.load(Ordering::Relaxed),
            malformed_raw: self.malformed_raw.load(Ordering::Relaxed),
            unhandled_messages: self.unhandled_messages.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
        }
    }

    /// Snapshot of the assembler counters
    pub fn assembler_stats(&self) -> AssemblerStats {
        lock(&self.assembler).stats()
    }

    /// Snapshot of the metrics engine counters
    pub fn metrics_stats(&self) -> MetricsStats {
        lock(&self.metrics).stats()
    }

    /// Path of the active raw sample log file
    pub fn raw_log_path(&self) -> std::path::PathBuf {
        self.raw_writer.active_path()
    }

    /// Path of the active band record log file
    pub fn band_log_path(&self) -> std::path::PathBuf {
        self.band_writer.active_path()
    }

    /// Path of the active metrics log file
    pub fn metrics_log_path(&self) -> std::path::PathBuf {
        self.metric_writer.active_path()
    }

    /// Pipeline configuration
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }
}

fn writer_config(config: &MonitorConfig, prefix: &str, fields: Vec<String>) -> WriterConfig {
    WriterConfig {
        prefix: prefix.to_string(),
        fields,
        dir: config.log_dir.clone(),
        buffer_capacity: config.buffer_capacity,
        rotate_bytes: config.rotate_bytes,
        max_retained: config.max_retained,
    }
}

/// Recover the guard from a poisoned mutex; assembler and engine state
/// stay consistent between calls, a panicking holder cannot tear them.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;

    /// Sink that records every push for assertions.
    #[derive(Default)]
    struct CaptureSink {
        raw: StdMutex<Vec<Vec<f64>>>,
        bands: StdMutex<Vec<[f64; 5]>>,
        metrics: StdMutex<Vec<[f64; 5]>>,
    }

    impl VisualSink for CaptureSink {
        fn push_raw(&self, _timestamp: DateTime<Utc>, values: &[f64]) {
            self.raw.lock().unwrap().push(values.to_vec());
        }

        fn push_bands(&self, _timestamp: DateTime<Utc>, values: &[f64; 5]) {
            self.bands.lock().unwrap().push(*values);
        }

        fn push_metrics(&self, _timestamp: DateTime<Utc>, values: &[f64; 5]) {
            self.metrics.lock().unwrap().push(*values);
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn test_pipeline(dir: &TempDir) -> (Arc<Pipeline>, Arc<CaptureSink>) {
        let sink = Arc::new(CaptureSink::default());
        let config = MonitorConfig::with_log_dir(dir.path());
        let pipeline = Pipeline::new(config, sink.clone()).unwrap();
        (Arc::new(pipeline), sink)
    }

    /// Drive one full reassembly cycle through the element route.
    fn send_cycle(pipeline: &Pipeline, secs: i64, values: [f64; 5]) {
        pipeline.handle("/muse/elements/touching_forehead", &[Arg::Int(1)], at(secs));
        for (band, value) in Band::ALL.iter().zip(values) {
            let address = format!("/muse/elements/{}_absolute", band.name());
            pipeline.handle(&address, &[Arg::Float(value)], at(secs));
        }
    }

    #[test]
    fn test_raw_route_persists_and_pushes() {
        let dir = TempDir::new().unwrap();
        let (pipeline, sink) = test_pipeline(&dir);

        pipeline.handle(
            "/muse/eeg",
            &[Arg::Float(843.2), Arg::Float(812.5), Arg::Float(799.1)],
            at(0),
        );
        pipeline.flush_all().unwrap();

        assert_eq!(pipeline.stats().raw_samples, 1);
        assert_eq!(sink.raw.lock().unwrap().len(), 1);
        assert_eq!(sink.raw.lock().unwrap()[0], vec![843.2, 812.5, 799.1]);

        let content = std::fs::read_to_string(pipeline.raw_log_path()).unwrap();
        assert!(content.ends_with(",843.2,812.5,799.1\n"));
    }

    #[test]
    fn test_raw_route_requires_two_arguments() {
        let dir = TempDir::new().unwrap();
        let (pipeline, sink) = test_pipeline(&dir);

        pipeline.handle("/muse/eeg", &[Arg::Float(843.2)], at(0));

        assert_eq!(pipeline.stats().raw_samples, 0);
        assert_eq!(pipeline.stats().unhandled_messages, 1);
        assert!(sink.raw.lock().unwrap().is_empty());
    }

    #[test]
    fn test_raw_route_drops_non_numeric_message() {
        let dir = TempDir::new().unwrap();
        let (pipeline, sink) = test_pipeline(&dir);

        pipeline.handle(
            "/muse/eeg",
            &[Arg::Float(843.2), Arg::Str("blink".to_string())],
            at(0),
        );

        assert_eq!(pipeline.stats().raw_samples, 0);
        assert_eq!(pipeline.stats().malformed_raw, 1);
        assert!(sink.raw.lock().unwrap().is_empty());
    }

    #[test]
    fn test_element_route_builds_record_and_metrics() {
        let dir = TempDir::new().unwrap();
        let (pipeline, sink) = test_pipeline(&dir);

        send_cycle(&*pipeline, 0, [0.1, 0.2, 0.3, 0.4, 0.5]);
        pipeline.flush_all().unwrap();

        let stats = pipeline.stats();
        assert_eq!(stats.band_records, 1);
        // The first band record always triggers a metric computation.
        assert_eq!(stats.metric_records, 1);

        assert_eq!(sink.bands.lock().unwrap()[0], [0.1, 0.2, 0.3, 0.4, 0.5]);
        assert_eq!(sink.metrics.lock().unwrap().len(), 1);

        let bands = std::fs::read_to_string(pipeline.band_log_path()).unwrap();
        assert!(bands.ends_with(",0.1,0.2,0.3,0.4,0.5\n"));
        let metrics = std::fs::read_to_string(pipeline.metrics_log_path()).unwrap();
        assert_eq!(metrics.lines().count(), 2);
    }

    #[test]
    fn test_metric_rate_limited_across_cycles() {
        let dir = TempDir::new().unwrap();
        let (pipeline, _sink) = test_pipeline(&dir);

        send_cycle(&*pipeline, 0, [0.1, 0.2, 0.3, 0.4, 0.5]);
        send_cycle(&*pipeline, 4, [0.1, 0.2, 0.3, 0.4, 0.5]);
        assert_eq!(pipeline.stats().band_records, 2);
        assert_eq!(pipeline.stats().metric_records, 1);

        // Past the window period a new metric is due.
        send_cycle(&*pipeline, 11, [0.1, 0.2, 0.3, 0.4, 0.5]);
        assert_eq!(pipeline.stats().metric_records, 2);
    }

    #[test]
    fn test_unknown_address_ignored() {
        let dir = TempDir::new().unwrap();
        let (pipeline, _sink) = test_pipeline(&dir);

        pipeline.handle("/muse/acc", &[Arg::Float(0.1), Arg::Float(0.2)], at(0));
        assert_eq!(pipeline.stats().unhandled_messages, 1);
        assert_eq!(pipeline.stats().raw_samples, 0);
    }

    #[test]
    fn test_reset_marker_via_element_route() {
        let dir = TempDir::new().unwrap();
        let (pipeline, _sink) = test_pipeline(&dir);

        pipeline.handle("/muse/elements/touching_forehead", &[Arg::Int(1)], at(0));
        pipeline.handle("/muse/elements/delta_absolute", &[Arg::Float(0.1)], at(0));
        // Three-argument message is the reset marker.
        pipeline.handle(
            "/muse/elements/horseshoe",
            &[Arg::Float(1.0), Arg::Float(1.0), Arg::Float(1.0)],
            at(0),
        );

        assert_eq!(pipeline.assembler_stats().resets, 1);
        assert_eq!(pipeline.stats().band_records, 0);
    }

    #[test]
    fn test_stats_expose_assembler_and_metrics() {
        let dir = TempDir::new().unwrap();
        let (pipeline, _sink) = test_pipeline(&dir);

        send_cycle(&*pipeline, 0, [0.1, 0.2, 0.3, 0.4, 0.5]);
        assert_eq!(pipeline.assembler_stats().records_completed, 1);
        assert_eq!(pipeline.metrics_stats().records_observed, 1);
        assert_eq!(pipeline.metrics_stats().computations, 1);
    }

    #[test]
    fn test_shutdown_drains_buffers() {
        let dir = TempDir::new().unwrap();
        let (pipeline, _sink) = test_pipeline(&dir);

        pipeline.handle("/muse/eeg", &[Arg::Float(1.5), Arg::Float(2.5)], at(0));
        // Buffered, not yet on disk.
        let before = std::fs::read_to_string(pipeline.raw_log_path()).unwrap();
        assert_eq!(before.lines().count(), 1);

        pipeline.shutdown().unwrap();
        let after = std::fs::read_to_string(pipeline.raw_log_path()).unwrap();
        assert_eq!(after.lines().count(), 2);
    }
}
