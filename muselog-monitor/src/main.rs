// Muselog Monitor - Headless session monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Muselog Monitor
//!
//! Headless driver for the muselog pipeline: replays a captured message
//! session into the pipeline, runs the periodic flush driver, and drains
//! the logs on exit.
//!
//! ## Usage
//!
//! ```bash
//! # Replay a captured session in real time
//! muselog-monitor --csv session.csv
//!
//! # Replay faster, into a custom log directory
//! muselog-monitor --csv session.csv --speed 10.0 --log-dir /var/log/muse
//! ```

mod flusher;
mod replay;

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use muselog::{AssemblerStats, MetricsStats, MonitorConfig, NullSink, Pipeline, PipelineStats};
use serde::Serialize;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use flusher::FlushDriver;
use replay::{ReplayConfig, ReplayEngine};

/// Muselog session monitor
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Session CSV to replay through the pipeline
    #[arg(short, long)]
    csv: String,

    /// Replay speed multiplier (1.0 = real-time)
    #[arg(short, long, default_value = "1.0")]
    speed: f64,

    /// Directory receiving the CSV logs
    #[arg(short, long, default_value = "logs")]
    log_dir: PathBuf,

    /// Metrics window in seconds
    #[arg(short, long, default_value = "10")]
    window_secs: u64,

    /// Periodic flush interval in seconds
    #[arg(short, long, default_value = "5")]
    flush_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// End-of-session counter dump.
#[derive(Serialize)]
struct SessionSummary {
    pipeline: PipelineStats,
    assembler: AssemblerStats,
    metrics: MetricsStats,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Muselog Monitor v{}", env!("CARGO_PKG_VERSION"));

    let config = MonitorConfig {
        log_dir: args.log_dir.clone(),
        window: Duration::from_secs(args.window_secs),
        flush_interval: Duration::from_secs(args.flush_secs),
        ..Default::default()
    };

    // Writer construction failures are the one fatal class: without log
    // files there is nothing to monitor into.
    let pipeline = match Pipeline::new(config.clone(), Arc::new(NullSink)) {
        Ok(pipeline) => Arc::new(pipeline),
        Err(e) => {
            error!("Failed to open log writers: {}", e);
            std::process::exit(1);
        }
    };
    info!("Logging to {}", config.log_dir.display());

    let engine = match ReplayEngine::from_csv(ReplayConfig {
        csv_path: args.csv.clone(),
        speed: args.speed,
    }) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Failed to load session: {}", e);
            std::process::exit(1);
        }
    };
    info!("Session loaded: {} messages", engine.message_count());

    let flush_handle = FlushDriver::new(Arc::clone(&pipeline), config.flush_interval).start();
    let replay_state = engine.state();

    tokio::select! {
        _ = engine.run(&pipeline) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            engine.stop();
        }
    }

    // Delivery has stopped; stop ticking, then drain what is buffered.
    flush_handle.stop().await;
    if let Err(e) = pipeline.shutdown() {
        error!("Final drain failed: {}", e);
    }

    info!(
        "Replayed {}/{} messages",
        replay_state.position.load(Ordering::SeqCst),
        replay_state.total.load(Ordering::SeqCst)
    );

    let summary = SessionSummary {
        pipeline: pipeline.stats(),
        assembler: pipeline.assembler_stats(),
        metrics: pipeline.metrics_stats(),
    };
    match serde_json::to_string_pretty(&summary) {
        Ok(json) => info!("Session summary: {}", json),
        Err(e) => error!("Could not serialize session summary: {}", e),
    }
}
