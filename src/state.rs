//! Application state
//!
//! Holds configuration, startup readiness and the shared components

use crate::detection_pipeline::DetectionPipeline;
use crate::detector::Thresholds;
use crate::image_fetcher::ImageSource;
use crate::polling_worker::CycleCounter;
use chrono::{DateTime, Local};
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// PollingWorker timings
#[derive(Debug, Clone)]
pub struct PollingConfig {
    /// Sleep after a completed cycle
    pub interval: Duration,
    /// Sleep after an unhandled failure or a failed readiness guard
    pub backoff: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            backoff: Duration::from_secs(60),
        }
    }
}

/// KeepaliveWorker timings
#[derive(Debug, Clone)]
pub struct KeepaliveConfig {
    /// Delay before the first ping
    pub grace: Duration,
    /// Sleep after a successful ping
    pub ok_interval: Duration,
    /// Sleep after a failed ping
    pub retry_interval: Duration,
    /// Per-ping HTTP timeout
    pub timeout: Duration,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(30),
            ok_interval: Duration::from_secs(600),
            retry_interval: Duration::from_secs(300),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Image source polled by the worker
    pub camera_source: ImageSource,
    /// Image source used by the manual trigger
    pub manual_source: ImageSource,
    /// Base URL the keepalive worker pings
    pub self_url: String,
    /// Server port
    pub port: u16,
    /// Server host
    pub host: String,
    /// Inference server URL
    pub detector_url: String,
    /// Realtime Database base URL (store disabled when absent)
    pub store_url: Option<String>,
    /// Realtime Database auth token
    pub store_auth: Option<String>,
    /// Directory for scoped temp files
    pub temp_dir: PathBuf,
    /// Image fetch timeout
    pub fetch_timeout: Duration,
    /// Detector thresholds
    pub thresholds: Thresholds,
    /// Max concurrent detector calls
    pub detect_concurrency: usize,
    pub polling: PollingConfig,
    pub keepalive: KeepaliveConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let port: u16 = env_or("PORT", 10000);
        let camera_source = ImageSource::parse(
            &std::env::var("CAMERA_URL")
                .unwrap_or_else(|_| "http://camera.local/capture".to_string()),
        );
        let manual_source = std::env::var("MANUAL_IMAGE_PATH")
            .map(|p| ImageSource::parse(&p))
            .unwrap_or_else(|_| camera_source.clone());

        Self {
            camera_source,
            manual_source,
            self_url: std::env::var("SELF_URL")
                .unwrap_or_else(|_| format!("http://127.0.0.1:{}", port)),
            port,
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            detector_url: std::env::var("DETECTOR_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:9000".to_string()),
            store_url: std::env::var("STORE_URL").ok().filter(|s| !s.is_empty()),
            store_auth: std::env::var("STORE_AUTH").ok().filter(|s| !s.is_empty()),
            temp_dir: std::env::var("TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir().join("camwatch")),
            fetch_timeout: Duration::from_millis(env_or("FETCH_TIMEOUT_MS", 10_000)),
            thresholds: Thresholds {
                confidence: env_or("CONFIDENCE_THRESHOLD", 0.25),
                overlap: env_or("OVERLAP_THRESHOLD", 0.45),
            },
            detect_concurrency: env_or("DETECT_CONCURRENCY", 1usize).max(1),
            polling: PollingConfig {
                interval: Duration::from_secs(env_or("POLL_INTERVAL_SECS", 30)),
                backoff: Duration::from_secs(env_or("BACKOFF_SECS", 60)),
            },
            keepalive: KeepaliveConfig {
                grace: Duration::from_secs(env_or("KEEPALIVE_GRACE_SECS", 30)),
                ok_interval: Duration::from_secs(env_or("KEEPALIVE_OK_SECS", 600)),
                retry_interval: Duration::from_secs(env_or("KEEPALIVE_RETRY_SECS", 300)),
                timeout: Duration::from_secs(10),
            },
        }
    }
}

impl AppConfig {
    /// Keepalive target resolves to this host only; such pings never reach the hosting proxy
    pub fn keepalive_is_loopback(&self) -> bool {
        let Ok(url) = reqwest::Url::parse(&self.self_url) else {
            return false;
        };
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.trim_start_matches('[').trim_end_matches(']');

        host.eq_ignore_ascii_case("localhost")
            || host.parse::<IpAddr>().map(|ip| ip.is_loopback()).unwrap_or(false)
    }
}

/// Startup capability check results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Readiness {
    pub model_ready: bool,
    pub store_ready: bool,
}

impl Readiness {
    pub fn ready() -> Self {
        Self {
            model_ready: true,
            store_ready: true,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.model_ready && self.store_ready
    }

    /// Human readable reason when not ready
    pub fn describe_missing(&self) -> Option<String> {
        match (self.model_ready, self.store_ready) {
            (true, true) => None,
            (false, true) => Some("Detection model not loaded".to_string()),
            (true, false) => Some("Result store not connected".to_string()),
            (false, false) => {
                Some("Detection model not loaded and result store not connected".to_string())
            }
        }
    }
}

/// Shared readiness snapshot
///
/// Readers copy the whole snapshot; only a re-probe replaces it.
#[derive(Debug, Clone, Default)]
pub struct ReadinessHandle {
    inner: Arc<RwLock<Readiness>>,
}

impl ReadinessHandle {
    pub fn new(initial: Readiness) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    pub async fn snapshot(&self) -> Readiness {
        *self.inner.read().await
    }

    pub async fn replace(&self, next: Readiness) {
        let mut current = self.inner.write().await;
        if *current != next {
            tracing::info!(
                model_ready = next.model_ready,
                store_ready = next.store_ready,
                "Readiness snapshot replaced"
            );
        }
        *current = next;
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: AppConfig,
    /// fetch → detect → build → publish
    pub pipeline: Arc<DetectionPipeline>,
    /// Startup readiness
    pub readiness: ReadinessHandle,
    /// Cycle counter (read-only outside the polling worker)
    pub cycles: CycleCounter,
    /// Process start time
    pub started_at: DateTime<Local>,
}
