//! JSON handlers and the HTML page.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::error::{AppError, AppResult};
use crate::download::extractor::parse_media_url;
use crate::download::formats::{select_formats, FormatOption, Quality};
use crate::web::AppState;

const INDEX_HTML: &str = include_str!("index.html");

/// Body of `/formats` and `/info`.
#[derive(Debug, Deserialize)]
pub struct UrlRequest {
    #[serde(default)]
    pub url: Option<String>,
}

/// Body of `/download`.
#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub quality: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FormatsResponse {
    pub success: bool,
    pub formats: Vec<FormatOption>,
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub success: bool,
    pub session_id: String,
    pub message: String,
    pub filename: String,
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub title: Option<String>,
    pub duration: Option<f64>,
    pub thumbnail: Option<String>,
    pub uploader: Option<String>,
}

/// Unwraps a JSON body, turning malformed input into a 400.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::Validation(format!("Invalid request body: {}", rejection.body_text())))
}

/// The URL field, or a 400 if it is absent or blank.
fn required_url(url: Option<String>) -> AppResult<String> {
    url.map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(AppError::missing_url)
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn formats(
    State(state): State<AppState>,
    payload: Result<Json<UrlRequest>, JsonRejection>,
) -> AppResult<Json<FormatsResponse>> {
    let url = required_url(json_body(payload)?.url)?;
    let url = parse_media_url(&url)?;

    let info = state.extractor.probe(&url).await?;
    let formats = select_formats(&info);
    log::info!("{} quality options for {}", formats.len(), url);

    Ok(Json(FormatsResponse { success: true, formats }))
}

pub async fn download(
    State(state): State<AppState>,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> AppResult<Json<DownloadResponse>> {
    let body = json_body(payload)?;
    let url = required_url(body.url)?;
    let quality = body
        .quality
        .as_deref()
        .unwrap_or_default()
        .parse::<Quality>()
        .map_err(AppError::Validation)?;

    let session_id = state.runner.start(&url, quality)?;

    Ok(Json(DownloadResponse {
        success: true,
        session_id,
        message: "Download started".to_string(),
        filename: "Processing...".to_string(),
    }))
}

pub async fn info(
    State(state): State<AppState>,
    payload: Result<Json<UrlRequest>, JsonRejection>,
) -> AppResult<Json<InfoResponse>> {
    let url = required_url(json_body(payload)?.url)?;
    let url = parse_media_url(&url)?;

    let info = state.extractor.probe(&url).await?;

    Ok(Json(InfoResponse {
        title: info.title,
        duration: info.duration,
        thumbnail: info.thumbnail,
        uploader: info.uploader,
    }))
}

/// Fallback for unknown routes.
pub async fn not_found() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}
