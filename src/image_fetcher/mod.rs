//! ImageFetcher - Single image retrieval from a camera URL or local file
//!
//! ## Responsibilities
//!
//! - HTTP GET with a hard timeout for URL sources
//! - Existence check for local path sources
//! - Scoped temp file for downloaded bytes (removed on every exit path)
//! - Decode + resize to the canonical 640x480 resolution

use crate::error::{FetchError, Result};
use image::imageops::FilterType;
use image::DynamicImage;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Width every fetched image is resized to
pub const CANONICAL_WIDTH: u32 = 640;
/// Height every fetched image is resized to
pub const CANONICAL_HEIGHT: u32 = 480;

/// Where an image comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// http(s) capture endpoint
    Url(String),
    /// File on the local filesystem
    Path(PathBuf),
}

impl ImageSource {
    /// `http://` / `https://` become URLs, anything else is a path
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let lower = raw.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            ImageSource::Url(raw.to_string())
        } else {
            ImageSource::Path(PathBuf::from(raw))
        }
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::Url(url) => write!(f, "{}", url),
            ImageSource::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Temp file removed when dropped
pub struct ScopedTempFile {
    path: PathBuf,
}

impl ScopedTempFile {
    /// Write `data` to a fresh uniquely named file under `dir`
    pub async fn create(dir: &Path, extension: &str, data: &[u8]) -> std::io::Result<Self> {
        let path = dir.join(format!("{}.{}", uuid::Uuid::new_v4(), extension));
        // Guard exists before the write so a partial file is still removed
        let guard = Self { path };
        fs::write(&guard.path, data).await?;
        Ok(guard)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScopedTempFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::trace!(path = %self.path.display(), "Temp image removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove temp image"
            ),
        }
    }
}

/// ImageFetcher instance
pub struct ImageFetcher {
    client: reqwest::Client,
    temp_dir: PathBuf,
    timeout: Duration,
}

impl ImageFetcher {
    /// Create new ImageFetcher
    ///
    /// # Arguments
    /// * `temp_dir` - Directory for downloaded images while they are decoded
    /// * `timeout` - Hard timeout for URL fetches
    pub async fn new(temp_dir: PathBuf, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        fs::create_dir_all(&temp_dir).await?;

        Ok(Self {
            client,
            temp_dir,
            timeout,
        })
    }

    /// Fetch, decode and normalize one image
    pub async fn fetch(&self, source: &ImageSource) -> std::result::Result<DynamicImage, FetchError> {
        match source {
            ImageSource::Url(url) => self.fetch_url(url).await,
            ImageSource::Path(path) => Self::fetch_path(path).await,
        }
    }

    async fn fetch_url(&self, url: &str) -> std::result::Result<DynamicImage, FetchError> {
        let bytes = self.download(url).await?;

        let temp = ScopedTempFile::create(&self.temp_dir, "jpg", &bytes)
            .await
            .map_err(|e| FetchError::Io(e.to_string()))?;

        tracing::debug!(
            url = %url,
            size = bytes.len(),
            path = %temp.path().display(),
            "Image downloaded"
        );

        decode_file(temp.path()).await
    }

    async fn download(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
        let timeout_ms = self.timeout.as_millis() as u64;
        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                FetchError::Timeout { ms: timeout_ms }
            } else {
                FetchError::Network(e.to_string())
            }
        };

        let resp = self.client.get(url).send().await.map_err(map_err)?;

        if !resp.status().is_success() {
            return Err(FetchError::Status(resp.status().as_u16()));
        }

        let bytes = resp.bytes().await.map_err(map_err)?;
        Ok(bytes.to_vec())
    }

    async fn fetch_path(path: &Path) -> std::result::Result<DynamicImage, FetchError> {
        if !fs::try_exists(path).await.unwrap_or(false) {
            return Err(FetchError::NotFound);
        }
        decode_file(path).await
    }
}

async fn decode_file(path: &Path) -> std::result::Result<DynamicImage, FetchError> {
    let bytes = fs::read(path)
        .await
        .map_err(|e| FetchError::Io(e.to_string()))?;

    tokio::task::spawn_blocking(move || decode_and_normalize(&bytes))
        .await
        .map_err(|e| FetchError::Io(format!("decode task failed: {}", e)))?
}

/// Decode image bytes and resize to the canonical resolution
pub fn decode_and_normalize(bytes: &[u8]) -> std::result::Result<DynamicImage, FetchError> {
    let img = image::load_from_memory(bytes).map_err(|_| FetchError::Decode)?;
    Ok(img.resize_exact(CANONICAL_WIDTH, CANONICAL_HEIGHT, FilterType::Triangle))
}
