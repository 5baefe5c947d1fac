//! Shared models and types for camwatch
//!
//! This module contains types shared across multiple modules
//! to avoid circular dependencies.

use serde::{Deserialize, Serialize};

/// Round a detector confidence to the published 2-decimal format, clamped to [0, 1]
pub fn round_confidence(confidence: f64) -> f64 {
    if !confidence.is_finite() {
        return 0.0;
    }
    ((confidence.clamp(0.0, 1.0)) * 100.0).round() / 100.0
}

/// One labeled detection as published
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionItem {
    pub label: String,
    /// Always rounded to 2 decimals, within [0, 1]
    pub confidence: f64,
}

impl DetectionItem {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence: round_confidence(confidence),
        }
    }
}

/// Outcome of a single detection attempt
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionOutcome {
    /// Objects found; never empty when built through [`DetectionOutcome::from_items`]
    Detected(Vec<DetectionItem>),
    /// Inference ran and found nothing
    Empty,
    /// Fetch or inference failed
    Failed(String),
}

impl DetectionOutcome {
    /// Build `Detected` or `Empty` depending on whether anything was found
    pub fn from_items(items: Vec<DetectionItem>) -> Self {
        if items.is_empty() {
            Self::Empty
        } else {
            Self::Detected(items)
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Number of detected objects (0 for `Empty` and `Failed`)
    pub fn count(&self) -> usize {
        match self {
            Self::Detected(items) => items.len(),
            _ => 0,
        }
    }
}

/// Published status of a result record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectionStatus {
    Detected,
    NoObjectsDetected,
    Error,
}

/// Canonical record written to `/detections/latest` and `/detections/history`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Local time, `%Y-%m-%d %H:%M:%S`
    pub timestamp: String,
    pub status: DetectionStatus,
    pub detections_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_detections: Option<Vec<DetectionItem>>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub model_ready: bool,
    pub store_ready: bool,
}

/// Service status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub service: String,
    pub status: String,
    pub version: String,
    pub model_loaded: bool,
    pub store_connected: bool,
    pub detection_cycle_count: u64,
    pub started_at: String,
    pub uptime_sec: i64,
    pub timestamp: String,
}

/// Keepalive target response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    pub status: String,
    pub timestamp: String,
}

/// Manual trigger response: the published record plus whether both store writes landed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualDetectResponse {
    #[serde(flatten)]
    pub record: ResultRecord,
    pub published: bool,
}
