//! Detector - Object inference capability
//!
//! ## Responsibilities
//!
//! - `Detector` trait: image in, (class index, confidence) pairs out
//! - Stable class index → label lookup
//! - `InferenceClient`: HTTP adapter for a pretrained detector served over REST
//!
//! The model itself is a black box; this module only shapes requests and
//! responses around it.

use crate::error::{Error, Result};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::sync::RwLock;
use std::time::Duration;

/// Confidence / NMS thresholds passed with every inference
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub confidence: f32,
    pub overlap: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            confidence: 0.25,
            overlap: 0.45,
        }
    }
}

/// One detection as reported by the model, before labeling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    #[serde(alias = "class", alias = "cls")]
    pub class_index: usize,
    #[serde(alias = "conf")]
    pub confidence: f64,
}

/// Object detector capability
#[async_trait]
pub trait Detector: Send + Sync {
    /// Run inference on an already normalized image
    async fn infer(&self, image: &DynamicImage, thresholds: Thresholds) -> Result<Vec<RawDetection>>;

    /// Label name for a class index
    fn label(&self, class_index: usize) -> Option<String>;

    /// Whether the model is loaded and answering
    async fn health_check(&self) -> bool;
}

/// Label for a class index, `class_{n}` when the table has no entry
pub fn label_or_fallback(detector: &dyn Detector, class_index: usize) -> String {
    detector
        .label(class_index)
        .unwrap_or_else(|| format!("class_{}", class_index))
}

/// Class index → label name table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelTable {
    pub names: Vec<String>,
}

impl LabelTable {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn get(&self, class_index: usize) -> Option<&str> {
        self.names.get(class_index).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }
}

#[derive(Debug, Deserialize)]
struct InferResponse {
    #[serde(default)]
    detections: Vec<RawDetection>,
}

/// HTTP inference server client
pub struct InferenceClient {
    client: reqwest::Client,
    base_url: String,
    labels: RwLock<LabelTable>,
}

impl InferenceClient {
    /// Create new inference client
    pub fn new(base_url: String) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    /// Create new inference client with custom timeout
    pub fn with_timeout(base_url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            labels: RwLock::new(LabelTable::default()),
        })
    }

    /// Get base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the label table from the server and cache it
    pub async fn load_labels(&self) -> Result<usize> {
        let url = format!("{}/v1/labels", self.base_url);
        let resp = self.client.get(&url).send().await?;

        if !resp.status().is_success() {
            return Err(Error::Detection(format!(
                "label table fetch failed: {}",
                resp.status()
            )));
        }

        let table: LabelTable = resp.json().await?;
        if table.is_empty() {
            return Err(Error::Detection("label table is empty".to_string()));
        }

        let count = table.len();
        match self.labels.write() {
            Ok(mut labels) => *labels = table,
            Err(poisoned) => *poisoned.into_inner() = table,
        }

        tracing::info!(labels = count, base_url = %self.base_url, "Detector label table loaded");
        Ok(count)
    }

    fn labels_loaded(&self) -> bool {
        self.labels.read().map(|l| !l.is_empty()).unwrap_or(false)
    }
}

fn encode_jpeg(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image.to_rgb8())
        .write_to(&mut buf, ImageFormat::Jpeg)
        .map_err(|e| Error::Detection(format!("failed to encode frame: {}", e)))?;
    Ok(buf.into_inner())
}

#[async_trait]
impl Detector for InferenceClient {
    async fn infer(&self, image: &DynamicImage, thresholds: Thresholds) -> Result<Vec<RawDetection>> {
        let url = format!("{}/v1/detect", self.base_url);
        let jpeg = encode_jpeg(image)?;

        let form = Form::new()
            .part(
                "image",
                Part::bytes(jpeg)
                    .file_name("frame.jpg")
                    .mime_str("image/jpeg")?,
            )
            .text("conf", thresholds.confidence.to_string())
            .text("iou", thresholds.overlap.to_string());

        let resp = self.client.post(&url).multipart(form).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Detection(format!(
                "inference failed: {} - {}",
                status, body
            )));
        }

        let result: InferResponse = resp.json().await?;
        Ok(result.detections)
    }

    fn label(&self, class_index: usize) -> Option<String> {
        self.labels
            .read()
            .ok()
            .and_then(|labels| labels.get(class_index).map(str::to_string))
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/healthz", self.base_url);
        let alive = match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::warn!(error = %e, base_url = %self.base_url, "Detector health check failed");
                false
            }
        };
        if !alive {
            return false;
        }

        if self.labels_loaded() {
            return true;
        }
        match self.load_labels().await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Detector label table unavailable");
                false
            }
        }
    }
}
