//! PollingWorker - Scheduled detection cycles
//!
//! ## Responsibilities
//!
//! - Run one pipeline pass on the camera source every interval, forever
//! - Readiness pre-flight guard (skip fetch/detect when model or store is not ready)
//! - Per-cycle failure boundary: a panic anywhere in the cycle is logged and
//!   followed by a single backoff sleep
//! - Own the cycle counter reported by `/status`
//!
//! ## Cycle
//!
//! ```text
//! Idle → Fetching → Detecting → Building → Publishing → Sleeping(interval) → Idle
//!   └────────────── any panic / not ready ──────────→ Sleeping(backoff)
//! ```
//!
//! Backoff is a fixed penalty; the cycle after it returns to the normal interval.

use crate::detection_pipeline::DetectionPipeline;
use crate::error::panic_message;
use crate::image_fetcher::ImageSource;
use crate::models::DetectionStatus;
use crate::state::{PollingConfig, ReadinessHandle};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Monotonic cycle counter; only the PollingWorker increments it
#[derive(Debug, Clone, Default)]
pub struct CycleCounter(Arc<AtomicU64>);

impl CycleCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    fn increment(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// What happened in one loop iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleResult {
    /// Pipeline ran to the end (its record may still carry `Error`)
    Completed {
        status: DetectionStatus,
        published: bool,
    },
    /// Pre-flight guard tripped; nothing was fetched
    NotReady(String),
    /// Unhandled failure inside the cycle
    Crashed(String),
}

/// PollingWorker instance
pub struct PollingWorker {
    pipeline: Arc<DetectionPipeline>,
    source: ImageSource,
    readiness: ReadinessHandle,
    counter: CycleCounter,
    config: PollingConfig,
}

impl PollingWorker {
    /// Create new PollingWorker
    pub fn new(
        pipeline: Arc<DetectionPipeline>,
        source: ImageSource,
        readiness: ReadinessHandle,
        counter: CycleCounter,
        config: PollingConfig,
    ) -> Self {
        Self {
            pipeline,
            source,
            readiness,
            counter,
            config,
        }
    }

    /// Read handle on the cycle counter
    pub fn counter(&self) -> CycleCounter {
        self.counter.clone()
    }

    /// Start the loop as a background task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Loop forever
    pub async fn run(self) {
        tracing::info!(
            source = %self.source,
            interval_sec = self.config.interval.as_secs(),
            backoff_sec = self.config.backoff.as_secs(),
            "Detection worker started"
        );

        loop {
            let (_, delay) = self.run_cycle().await;
            tokio::time::sleep(delay).await;
        }
    }

    /// One loop iteration; returns what happened and how long to sleep next
    pub async fn run_cycle(&self) -> (CycleResult, Duration) {
        let cycle = self.counter.increment();

        let readiness = self.readiness.snapshot().await;
        if let Some(reason) = readiness.describe_missing() {
            tracing::warn!(
                cycle = cycle,
                model_ready = readiness.model_ready,
                store_ready = readiness.store_ready,
                reason = %reason,
                "Skipping detection cycle, dependencies not ready"
            );

            // Re-probe so the next cycle sees a fresh snapshot
            let fresh = self.pipeline.probe_readiness().await;
            self.readiness.replace(fresh).await;

            return (CycleResult::NotReady(reason), self.config.backoff);
        }

        tracing::info!(cycle = cycle, "Running detection cycle");

        match AssertUnwindSafe(self.pipeline.run_once(&self.source))
            .catch_unwind()
            .await
        {
            Ok(report) => {
                match report.record.status {
                    DetectionStatus::Error => tracing::warn!(
                        cycle = cycle,
                        error = ?report.record.error,
                        published = report.published,
                        "Detection cycle finished with error"
                    ),
                    _ => tracing::info!(
                        cycle = cycle,
                        detections = report.record.detections_count,
                        published = report.published,
                        "Detection cycle finished"
                    ),
                }

                (
                    CycleResult::Completed {
                        status: report.record.status,
                        published: report.published,
                    },
                    self.config.interval,
                )
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(cycle = cycle, error = %message, "Detection worker error");
                (CycleResult::Crashed(message), self.config.backoff)
            }
        }
    }
}
