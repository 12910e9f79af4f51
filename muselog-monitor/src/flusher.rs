// Muselog Monitor - Periodic flush driver
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Periodic flush driver.
//!
//! The pipeline's writers flush on their own when a buffer fills; this
//! driver adds a wall-clock tick so that a slow stream still reaches disk
//! within one interval, bounding worst-case data loss on abnormal
//! termination. The task stops explicitly via its handle; the final drain
//! is the caller's [`Pipeline::shutdown`].
//!
//! [`Pipeline::shutdown`]: muselog::Pipeline::shutdown

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use muselog::Pipeline;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Ticks the pipeline's `flush_all` on a fixed interval.
pub struct FlushDriver {
    pipeline: Arc<Pipeline>,
    interval: Duration,
}

/// Handle to a running flush driver.
pub struct FlushHandle {
    running: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl FlushDriver {
    /// Create a driver flushing every `interval`
    pub fn new(pipeline: Arc<Pipeline>, interval: Duration) -> Self {
        Self { pipeline, interval }
    }

    /// Spawn the periodic task and return its handle.
    pub fn start(self) -> FlushHandle {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let task = tokio::spawn(async move {
            debug!("flush driver started ({:?} interval)", self.interval);
            while flag.load(Ordering::SeqCst) {
                sleep(self.interval).await;
                if !flag.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(err) = self.pipeline.flush_all() {
                    // Writers retain their rows; the next tick retries.
                    warn!("periodic flush failed: {}", err);
                }
            }
            debug!("flush driver stopped");
        });

        FlushHandle { running, task }
    }
}

impl FlushHandle {
    /// Stop ticking and wait for the task to finish.
    ///
    /// A flush already in progress completes; one pending in a sleep is
    /// cancelled. Buffered rows are drained afterwards by the caller.
    pub async fn stop(self) {
        self.running.store(false, Ordering::SeqCst);
        self.task.abort();
        let _ = self.task.await;
    }
}
