use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;

use crate::download::error::ExtractorError;

/// Centralized error type at the request/operation boundary.
///
/// Every variant maps to an HTTP status and renders as `{"error": "..."}`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Bad or missing client input
    #[error("{0}")]
    Validation(String),

    /// yt-dlp failures surfaced synchronously
    #[error(transparent)]
    Extractor(#[from] ExtractorError),

    /// Download admission is full
    #[error("Too many downloads in progress, try again later")]
    Busy,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Anyhow errors (for general error handling)
    #[error("Application error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn missing_url() -> Self {
        AppError::Validation("URL is required".to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Busy => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Extractor(_) | AppError::Io(_) | AppError::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Request failed ({}): {}", status, self);
        } else {
            log::info!("Request rejected ({}): {}", status, self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
