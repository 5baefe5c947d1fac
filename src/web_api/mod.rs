//! WebAPI - HTTP surface
//!
//! ## Responsibilities
//!
//! - Health / status / keepalive endpoints
//! - Manual detection trigger (one synchronous pipeline pass)
//! - Response formatting

mod routes;

pub use routes::create_router;

use axum::extract::State;
use axum::response::{Html, IntoResponse};
use axum::Json;
use chrono::Local;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;

use crate::error::{panic_message, Error, Result};
use crate::models::{HealthResponse, ManualDetectResponse, PingResponse, StatusResponse};
use crate::state::AppState;

/// Landing page
pub async fn home() -> Html<&'static str> {
    Html(
        r#"<h1>Object Detection Service</h1>
<p>Service is running.</p>
<p>Endpoints:</p>
<ul>
    <li><a href="/health">/health</a> - Health check</li>
    <li><a href="/detect">/detect</a> - Manual detection</li>
    <li><a href="/status">/status</a> - Service status</li>
    <li><a href="/ping">/ping</a> - Keepalive target</li>
</ul>
"#,
    )
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let readiness = state.readiness.snapshot().await;

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Local::now().to_rfc3339(),
        model_ready: readiness.model_ready,
        store_ready: readiness.store_ready,
    })
}

/// Service status endpoint
pub async fn service_status(State(state): State<AppState>) -> impl IntoResponse {
    let readiness = state.readiness.snapshot().await;
    let now = Local::now();

    Json(StatusResponse {
        service: "Object Detection".to_string(),
        status: "running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_loaded: readiness.model_ready,
        store_connected: readiness.store_ready,
        detection_cycle_count: state.cycles.get(),
        started_at: state.started_at.to_rfc3339(),
        uptime_sec: (now - state.started_at).num_seconds(),
        timestamp: now.to_rfc3339(),
    })
}

/// Manual detection trigger
///
/// Not ready → 503 `NOT_READY`; a panic inside the pass → 500 `INTERNAL_ERROR`.
/// Fetch / detector / publish failures are reported inside the record.
pub async fn manual_detect(State(state): State<AppState>) -> Result<Json<ManualDetectResponse>> {
    let readiness = state.readiness.snapshot().await;
    if let Some(reason) = readiness.describe_missing() {
        tracing::warn!(reason = %reason, "Manual detection rejected, dependencies not ready");
        return Err(Error::Readiness(reason));
    }

    tracing::info!(source = %state.config.manual_source, "Manual detection triggered");
    let report = AssertUnwindSafe(state.pipeline.run_once(&state.config.manual_source))
        .catch_unwind()
        .await
        .map_err(|panic| {
            Error::Internal(format!(
                "detection pass panicked: {}",
                panic_message(panic.as_ref())
            ))
        })?;

    Ok(Json(ManualDetectResponse {
        record: report.record,
        published: report.published,
    }))
}

/// Keepalive target
pub async fn ping() -> impl IntoResponse {
    Json(PingResponse {
        status: "pong".to_string(),
        timestamp: Local::now().to_rfc3339(),
    })
}
