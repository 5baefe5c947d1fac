//! Publisher - Result record delivery to the remote data store
//!
//! ## Responsibilities
//!
//! - Overwrite `/detections/latest` with the newest record
//! - Append the record to `/detections/history`
//! - Best-effort: every failure is logged and folded into a `false` return
//!
//! Stores:
//! - `RealtimeDbStore` - Realtime Database REST API (PUT latest / POST history)
//! - `MemoryStore` - in-process store for local runs and tests

use crate::error::{Error, Result};
use crate::models::ResultRecord;
use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Store path overwritten on every publish
pub const LATEST_PATH: &str = "detections/latest";
/// Store path appended on every publish
pub const HISTORY_PATH: &str = "detections/history";

/// Last-value + append-only log store
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Overwrite the latest slot
    async fn set_latest(&self, record: &ResultRecord) -> Result<()>;

    /// Append to the history log
    async fn push_history(&self, record: &ResultRecord) -> Result<()>;

    /// Whether the store is reachable with the configured credentials
    async fn health_check(&self) -> bool;
}

/// Realtime Database REST store
pub struct RealtimeDbStore {
    client: reqwest::Client,
    base_url: String,
    auth: Option<String>,
}

impl RealtimeDbStore {
    pub fn new(base_url: String, auth: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}.json", self.base_url, path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.auth {
            Some(token) => builder.query(&[("auth", token.as_str())]),
            None => builder,
        }
    }

    async fn check(resp: reqwest::Response, op: &str) -> Result<()> {
        if resp.status().is_success() {
            return Ok(());
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Err(Error::Publish(format!("{} failed: {} - {}", op, status, body)))
    }
}

#[async_trait]
impl ResultStore for RealtimeDbStore {
    async fn set_latest(&self, record: &ResultRecord) -> Result<()> {
        let resp = self
            .request(reqwest::Method::PUT, LATEST_PATH)
            .json(record)
            .send()
            .await?;
        Self::check(resp, "set latest").await
    }

    async fn push_history(&self, record: &ResultRecord) -> Result<()> {
        let resp = self
            .request(reqwest::Method::POST, HISTORY_PATH)
            .json(record)
            .send()
            .await?;
        Self::check(resp, "push history").await
    }

    async fn health_check(&self) -> bool {
        let req = self
            .request(reqwest::Method::GET, LATEST_PATH)
            .query(&[("shallow", "true")]);
        match req.send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::warn!(error = %e, "Result store health check failed");
                false
            }
        }
    }
}

/// In-process store
#[derive(Default)]
pub struct MemoryStore {
    latest: RwLock<Option<ResultRecord>>,
    history: RwLock<Vec<ResultRecord>>,
    fail_latest: AtomicBool,
    fail_history: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail
    pub fn set_failing(&self, latest: bool, history: bool) {
        self.fail_latest.store(latest, Ordering::SeqCst);
        self.fail_history.store(history, Ordering::SeqCst);
    }

    pub async fn latest(&self) -> Option<ResultRecord> {
        self.latest.read().await.clone()
    }

    pub async fn history(&self) -> Vec<ResultRecord> {
        self.history.read().await.clone()
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn set_latest(&self, record: &ResultRecord) -> Result<()> {
        if self.fail_latest.load(Ordering::SeqCst) {
            return Err(Error::Publish("latest slot unavailable".to_string()));
        }
        *self.latest.write().await = Some(record.clone());
        Ok(())
    }

    async fn push_history(&self, record: &ResultRecord) -> Result<()> {
        if self.fail_history.load(Ordering::SeqCst) {
            return Err(Error::Publish("history log unavailable".to_string()));
        }
        self.history.write().await.push(record.clone());
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }
}

/// Placeholder when no store URL is configured; never ready, every write fails
pub struct DisabledStore;

#[async_trait]
impl ResultStore for DisabledStore {
    async fn set_latest(&self, _record: &ResultRecord) -> Result<()> {
        Err(Error::Readiness("result store not configured".to_string()))
    }

    async fn push_history(&self, _record: &ResultRecord) -> Result<()> {
        Err(Error::Readiness("result store not configured".to_string()))
    }

    async fn health_check(&self) -> bool {
        false
    }
}

/// Publisher instance
#[derive(Clone)]
pub struct Publisher {
    store: Arc<dyn ResultStore>,
}

impl Publisher {
    pub fn new(store: Arc<dyn ResultStore>) -> Self {
        Self { store }
    }

    /// Write latest + history; true only when both writes were acknowledged
    pub async fn publish(&self, record: &ResultRecord) -> bool {
        let latest = self.guarded(self.store.set_latest(record), "set latest").await;
        // History is still attempted when latest fails
        let history = self.guarded(self.store.push_history(record), "push history").await;

        let ok = latest && history;
        if ok {
            tracing::info!(status = ?record.status, "Result published");
        } else {
            tracing::warn!(
                status = ?record.status,
                latest_ok = latest,
                history_ok = history,
                "Result publish incomplete"
            );
        }
        ok
    }

    async fn guarded<F>(&self, write: F, op: &'static str) -> bool
    where
        F: std::future::Future<Output = Result<()>>,
    {
        match AssertUnwindSafe(write).catch_unwind().await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::error!(error = %e, op = op, "Failed to write to result store");
                false
            }
            Err(_) => {
                tracing::error!(op = op, "Result store write panicked");
                false
            }
        }
    }

    pub async fn health_check(&self) -> bool {
        self.store.health_check().await
    }
}
