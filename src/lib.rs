//! camwatch Library
//!
//! Scheduled camera object detection relay.
//!
//! ## Architecture
//!
//! 1. ImageFetcher - Camera URL / local file → normalized 640x480 image
//! 2. Detector - Object inference capability (HTTP inference server adapter)
//! 3. ResultBuilder - DetectionOutcome → canonical ResultRecord
//! 4. Publisher - latest + history writes to the remote store
//! 5. DetectionPipeline - One fetch → detect → build → publish pass
//! 6. PollingWorker - Scheduled cycles with readiness guard and backoff
//! 7. KeepaliveWorker - Self ping against idle shutdown
//! 8. WebAPI - health / status / manual trigger / ping
//!
//! ## Design Principles
//!
//! - Failures stop at the stage that produced them
//! - Workers never exit on their own
//! - No shared mutable state besides the readiness snapshot and cycle counter

pub mod detection_pipeline;
pub mod detector;
pub mod error;
pub mod image_fetcher;
pub mod keepalive_worker;
pub mod models;
pub mod polling_worker;
pub mod publisher;
pub mod result_builder;
pub mod state;
pub mod web_api;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use state::AppState;
