//! DetectionPipeline - One fetch → detect → build → publish pass
//!
//! ## Responsibilities
//!
//! - Run the four stages strictly in order
//! - Convert fetch and detector failures into `DetectionOutcome::Failed`
//! - Bound concurrent detector calls (scheduled + manual callers)
//! - Probe detector / store readiness
//!
//! Shared by the PollingWorker and the manual `/detect` endpoint. Every value
//! produced here is local to the call; the only shared state is the detector
//! semaphore.

use crate::detector::{label_or_fallback, Detector, Thresholds};
use crate::image_fetcher::{ImageFetcher, ImageSource};
use crate::models::{DetectionItem, DetectionOutcome, ResultRecord};
use crate::publisher::Publisher;
use crate::result_builder;
use crate::state::Readiness;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Result of one pipeline pass
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub record: ResultRecord,
    /// Both store writes acknowledged
    pub published: bool,
}

/// DetectionPipeline instance
pub struct DetectionPipeline {
    fetcher: ImageFetcher,
    detector: Arc<dyn Detector>,
    publisher: Publisher,
    thresholds: Thresholds,
    detect_permits: Semaphore,
}

impl DetectionPipeline {
    /// Create new DetectionPipeline
    ///
    /// `detect_concurrency` bounds simultaneous detector calls (min 1)
    pub fn new(
        fetcher: ImageFetcher,
        detector: Arc<dyn Detector>,
        publisher: Publisher,
        thresholds: Thresholds,
        detect_concurrency: usize,
    ) -> Self {
        Self {
            fetcher,
            detector,
            publisher,
            thresholds,
            detect_permits: Semaphore::new(detect_concurrency.max(1)),
        }
    }

    /// Fetch + detect; never fails, failures come back as `Failed`
    pub async fn detect(&self, source: &ImageSource) -> DetectionOutcome {
        let image = match self.fetcher.fetch(source).await {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(source = %source, error = %e, "Image fetch failed");
                return DetectionOutcome::failed(e.to_string());
            }
        };

        let _permit = match self.detect_permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => return DetectionOutcome::failed("Detection error: detector unavailable"),
        };

        let raw = match AssertUnwindSafe(self.detector.infer(&image, self.thresholds))
            .catch_unwind()
            .await
        {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Detector failed");
                return DetectionOutcome::failed(e.to_string());
            }
            Err(_) => {
                tracing::error!("Detector panicked");
                return DetectionOutcome::failed("Detection error: detector panicked");
            }
        };

        let items: Vec<DetectionItem> = raw
            .into_iter()
            .map(|d| {
                DetectionItem::new(
                    label_or_fallback(self.detector.as_ref(), d.class_index),
                    d.confidence,
                )
            })
            .collect();

        tracing::debug!(count = items.len(), source = %source, "Detection finished");
        DetectionOutcome::from_items(items)
    }

    /// Full pass: fetch → detect → build → publish
    pub async fn run_once(&self, source: &ImageSource) -> CycleReport {
        let outcome = self.detect(source).await;
        let record = result_builder::build(outcome);
        let published = self.publisher.publish(&record).await;

        CycleReport { record, published }
    }

    /// Check detector and store readiness
    pub async fn probe_readiness(&self) -> Readiness {
        let (model_ready, store_ready) =
            tokio::join!(self.detector.health_check(), self.publisher.health_check());

        Readiness {
            model_ready,
            store_ready,
        }
    }
}
