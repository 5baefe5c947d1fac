//! API Routes

use axum::{routing::get, Router};

use crate::state::AppState;

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(super::home))
        // Health & Status
        .route("/health", get(super::health_check))
        .route("/status", get(super::service_status))
        .route("/ping", get(super::ping))
        // Detection
        .route("/detect", get(super::manual_detect))
        .with_state(state)
}
