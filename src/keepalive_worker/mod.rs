//! KeepaliveWorker - Self ping against idle shutdown
//!
//! Waits a grace period after startup, then GETs the service's own
//! keepalive endpoint forever: long sleep after a good ping, shorter
//! retry sleep after a failed one. Shares nothing with the PollingWorker.

use crate::error::Result;
use crate::state::KeepaliveConfig;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Path pinged on the service's own base URL
pub const KEEPALIVE_PATH: &str = "/ping";

/// Result of one ping
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PingOutcome {
    Ok,
    Failed(String),
}

/// KeepaliveWorker instance
pub struct KeepaliveWorker {
    client: reqwest::Client,
    target: String,
    config: KeepaliveConfig,
}

impl KeepaliveWorker {
    pub fn new(self_url: &str, config: KeepaliveConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        let target = format!("{}{}", self_url.trim_end_matches('/'), KEEPALIVE_PATH);

        Ok(Self {
            client,
            target,
            config,
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        tracing::info!(
            target_url = %self.target,
            grace_sec = self.config.grace.as_secs(),
            "Keepalive worker started"
        );
        tokio::time::sleep(self.config.grace).await;

        loop {
            let (_, delay) = self.ping_once().await;
            tokio::time::sleep(delay).await;
        }
    }

    /// Ping once; returns the outcome and the sleep before the next ping
    pub async fn ping_once(&self) -> (PingOutcome, Duration) {
        let outcome = match self.client.get(&self.target).send().await {
            Ok(resp) if resp.status().is_success() => PingOutcome::Ok,
            Ok(resp) => PingOutcome::Failed(format!("HTTP {}", resp.status())),
            Err(e) => PingOutcome::Failed(e.to_string()),
        };

        match &outcome {
            PingOutcome::Ok => {
                tracing::debug!(target_url = %self.target, "Keepalive ping ok");
                (outcome, self.config.ok_interval)
            }
            PingOutcome::Failed(reason) => {
                tracing::warn!(
                    target_url = %self.target,
                    error = %reason,
                    retry_sec = self.config.retry_interval.as_secs(),
                    "Keepalive ping failed"
                );
                (outcome, self.config.retry_interval)
            }
        }
    }
}
