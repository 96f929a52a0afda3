//! Collaborator abstraction: the narrow interface through which all media
//! extraction and downloading is delegated.
//!
//! The web layer and the background runner only ever talk to
//! `dyn MediaExtractor`; `YtDlpExtractor` is the production backend and tests
//! plug in a scripted mock.

use crate::download::error::ExtractorError;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use std::path::PathBuf;
use tokio::sync::mpsc;
use url::Url;

/// One stream variant as listed by the collaborator's metadata.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FormatVariant {
    #[serde(default)]
    pub format_id: String,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub height: Option<u64>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub filesize: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub filesize_approx: Option<u64>,
}

/// Probed metadata for a single media URL.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MediaInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub formats: Vec<FormatVariant>,
}

/// yt-dlp reports sizes and heights as integers most of the time, but
/// approximations come through as floats and missing values as null.
fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        serde_json::Value::Number(n) => n.as_u64().or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        serde_json::Value::String(s) => s.parse::<u64>().ok(),
        _ => None,
    }))
}

/// Lifecycle stage reported by the collaborator for the current file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Downloading,
    /// One file finished; post-processing or further parts may follow.
    Finished,
}

/// Progress event emitted by the collaborator during a fetch.
///
/// Mirrors the collaborator's own counters; translation into the record shown
/// to clients happens in `ProgressReporter`.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchProgress {
    pub status: FetchStatus,
    pub downloaded_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
    pub total_bytes_estimate: Option<u64>,
    /// Bytes per second
    pub speed: Option<f64>,
    /// Seconds remaining
    pub eta: Option<u64>,
}

impl FetchProgress {
    pub fn downloading(downloaded: u64, total: Option<u64>) -> Self {
        Self {
            status: FetchStatus::Downloading,
            downloaded_bytes: Some(downloaded),
            total_bytes: total,
            total_bytes_estimate: None,
            speed: None,
            eta: None,
        }
    }

    pub fn finished(downloaded: u64) -> Self {
        Self {
            status: FetchStatus::Finished,
            downloaded_bytes: Some(downloaded),
            total_bytes: Some(downloaded),
            total_bytes_estimate: None,
            speed: None,
            eta: None,
        }
    }
}

/// Parameters for a fetch.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: Url,
    /// Collaborator format selector, e.g. `bestaudio/best`
    pub format_selector: String,
    /// Directory the produced file is written into
    pub output_dir: PathBuf,
}

/// Result of a successful fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutput {
    /// Path of the file the collaborator produced
    pub file_path: PathBuf,
}

/// The external media-extraction collaborator.
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Human-readable backend name (e.g. "yt-dlp")
    fn name(&self) -> &str;

    /// Fetch metadata without downloading anything.
    async fn probe(&self, url: &Url) -> Result<MediaInfo, ExtractorError>;

    /// Download to `request.output_dir`, sending progress events through the
    /// channel as they happen. The sender is dropped when the fetch returns.
    async fn fetch(
        &self,
        request: &FetchRequest,
        progress_tx: mpsc::UnboundedSender<FetchProgress>,
    ) -> Result<FetchOutput, ExtractorError>;
}

/// Parses user input into a URL the collaborator may be handed.
///
/// Only http(s) URLs are accepted, so local paths and other schemes never
/// reach yt-dlp.
pub fn parse_media_url(raw: &str) -> Result<Url, ExtractorError> {
    let trimmed = raw.trim();
    let url = Url::parse(trimmed).map_err(|e| ExtractorError::UnsupportedUrl(format!("Invalid URL '{}': {}", trimmed, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ExtractorError::UnsupportedUrl(format!(
            "Unsupported URL scheme '{}': only http and https links can be downloaded",
            other
        ))),
    }
}
