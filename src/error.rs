//! Error handling for camwatch

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Why an image could not be produced for a cycle
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Local source path does not exist
    #[error("Image file not found")]
    NotFound,

    /// Bytes could not be decoded into an image
    #[error("Failed to read image")]
    Decode,

    /// Remote source did not answer within the fetch timeout
    #[error("Image fetch timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Remote source answered with a non-2xx status
    #[error("Image fetch failed with HTTP {0}")]
    Status(u16),

    /// Connection-level failure
    #[error("Image fetch network error: {0}")]
    Network(String),

    /// Temp file handling failed
    #[error("Image fetch IO error: {0}")]
    Io(String),
}

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Detector capability failure
    #[error("Detection error: {0}")]
    Detection(String),

    /// Result store write failure
    #[error("Publish error: {0}")]
    Publish(String),

    /// Model or store not initialized
    #[error("Not ready: {0}")]
    Readiness(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            Error::Detection(_) => (StatusCode::BAD_GATEWAY, "DETECTION_ERROR"),
            Error::Publish(_) => (StatusCode::BAD_GATEWAY, "PUBLISH_ERROR"),
            Error::Readiness(_) => (StatusCode::SERVICE_UNAVAILABLE, "NOT_READY"),
            Error::Http(_) => (StatusCode::BAD_GATEWAY, "HTTP_ERROR"),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };
        let message = self.to_string();

        tracing::error!(
            status = %status,
            error_code = %error_code,
            message = %message,
            "Request error"
        );

        let body = Json(json!({
            "error_code": error_code,
            "message": message
        }));

        (status, body).into_response()
    }
}

/// Text carried by a caught panic payload
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
