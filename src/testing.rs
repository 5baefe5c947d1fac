//! Test doubles shared by unit tests

use crate::detector::{Detector, RawDetection, Thresholds};
use crate::error::{Error, Result};
use async_trait::async_trait;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn png_bytes(w: u32, h: u32) -> Vec<u8> {
    let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(w, h, Rgb([90, 90, 90]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

pub fn scratch_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("camwatch-test-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Write a small PNG into a fresh scratch dir and return its path
pub fn image_on_disk() -> PathBuf {
    let path = scratch_dir().join("frame.png");
    std::fs::write(&path, png_bytes(64, 48)).unwrap();
    path
}

pub enum Script {
    Return(Vec<RawDetection>),
    Fail(String),
    Panic,
}

/// Scripted detector that records how often it was called
pub struct MockDetector {
    pub labels: Vec<String>,
    pub healthy: AtomicBool,
    pub calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub delay: Duration,
    pub panic_on_label: AtomicBool,
    script: Mutex<Script>,
}

impl MockDetector {
    pub fn new(script: Script) -> Self {
        Self {
            labels: vec!["person".to_string(), "cat".to_string(), "dog".to_string()],
            healthy: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            delay: Duration::ZERO,
            panic_on_label: AtomicBool::new(false),
            script: Mutex::new(script),
        }
    }

    pub fn returning(raw: Vec<(usize, f64)>) -> Self {
        Self::new(Script::Return(
            raw.into_iter()
                .map(|(class_index, confidence)| RawDetection {
                    class_index,
                    confidence,
                })
                .collect(),
        ))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn unhealthy(self) -> Self {
        self.healthy.store(false, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Detector for MockDetector {
    async fn infer(&self, _image: &DynamicImage, _thresholds: Thresholds) -> Result<Vec<RawDetection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let result = match &*self.script.lock().unwrap() {
            Script::Return(raw) => Some(Ok(raw.clone())),
            Script::Fail(reason) => Some(Err(Error::Detection(reason.clone()))),
            Script::Panic => None,
        };
        match result {
            Some(result) => result,
            None => panic!("model crashed"),
        }
    }

    fn label(&self, class_index: usize) -> Option<String> {
        // One-shot: the flag is cleared by the panic that consumes it
        if self.panic_on_label.swap(false, Ordering::SeqCst) {
            panic!("label table corrupted");
        }
        self.labels.get(class_index).cloned()
    }

    async fn health_check(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}
