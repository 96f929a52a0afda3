//! Scripted media extractor for exercising the runner and the HTTP surface
//! without spawning yt-dlp.

#![allow(dead_code, clippy::panic)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::sleep;
use url::Url;

use dlweb::download::error::ExtractorError;
use dlweb::download::extractor::{
    FetchOutput, FetchProgress, FetchRequest, FormatVariant, MediaExtractor, MediaInfo,
};

/// Configuration for the mock extractor
#[derive(Debug, Clone)]
pub struct MockExtractorConfig {
    /// Progress events sent during every fetch, in order
    pub steps: Vec<FetchProgress>,
    /// Delay before each progress event
    pub step_delay: Duration,
    /// File name reported on success; `fetch_error` takes precedence
    pub file_name: String,
    pub fetch_error: Option<ExtractorError>,
    /// Fetches panic after sending the configured progress
    pub panic_in_fetch: bool,
    /// Metadata returned by `probe`, or the error it fails with
    pub probe: Result<MediaInfo, ExtractorError>,
}

impl Default for MockExtractorConfig {
    fn default() -> Self {
        Self {
            steps: vec![
                FetchProgress::downloading(0, Some(1000)),
                FetchProgress::downloading(250, Some(1000)),
                FetchProgress::downloading(600, Some(1000)),
                FetchProgress::downloading(1000, Some(1000)),
                FetchProgress::finished(1000),
            ],
            step_delay: Duration::from_millis(20),
            file_name: "Test_clip.mp4".to_string(),
            fetch_error: None,
            panic_in_fetch: false,
            probe: Ok(sample_media_info()),
        }
    }
}

impl MockExtractorConfig {
    /// No delays, no progress events
    pub fn instant() -> Self {
        Self {
            steps: Vec::new(),
            step_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Fetches fail with `error` after sending the configured progress
    pub fn failing(error: ExtractorError) -> Self {
        Self {
            fetch_error: Some(error),
            ..Self::default()
        }
    }

    /// Fetches panic after sending the configured progress
    pub fn panicking() -> Self {
        Self {
            panic_in_fetch: true,
            ..Self::default()
        }
    }

    pub fn with_steps(mut self, steps: Vec<FetchProgress>) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_probe_error(mut self, error: ExtractorError) -> Self {
        self.probe = Err(error);
        self
    }
}

/// Metadata with two 480p variants of different sizes and one 720p variant,
/// plus an audio-only track and a storyboard without height.
pub fn sample_media_info() -> MediaInfo {
    let variant = |id: &str, height: Option<u64>, vcodec: &str, filesize: Option<u64>| FormatVariant {
        format_id: id.to_string(),
        ext: Some("mp4".to_string()),
        height,
        vcodec: Some(vcodec.to_string()),
        filesize,
        filesize_approx: None,
    };

    MediaInfo {
        title: Some("Test clip".to_string()),
        duration: Some(212.0),
        thumbnail: Some("https://img.example.com/t.jpg".to_string()),
        uploader: Some("Uploader".to_string()),
        formats: vec![
            variant("140", None, "none", Some(3_000_000)),
            variant("sb0", None, "images", None),
            variant("18", Some(480), "avc1", Some(5_000_000)),
            variant("135", Some(480), "avc1", Some(8_000_000)),
            variant("22", Some(720), "avc1", Some(12_000_000)),
        ],
    }
}

/// Scripted `MediaExtractor`.
pub struct MockExtractor {
    config: MockExtractorConfig,
    /// When set, every fetch waits for one permit before completing
    gate: Option<Arc<Semaphore>>,
    fetch_calls: AtomicU64,
    probe_calls: AtomicU64,
}

impl MockExtractor {
    pub fn new(config: MockExtractorConfig) -> Self {
        Self {
            config,
            gate: None,
            fetch_calls: AtomicU64::new(0),
            probe_calls: AtomicU64::new(0),
        }
    }

    /// Fetches block until a permit is added to the returned semaphore.
    pub fn gated(config: MockExtractorConfig) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let mut extractor = Self::new(config);
        extractor.gate = Some(Arc::clone(&gate));
        (extractor, gate)
    }

    pub fn fetch_calls(&self) -> u64 {
        self.fetch_calls.load(Ordering::Relaxed)
    }

    pub fn probe_calls(&self) -> u64 {
        self.probe_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MediaExtractor for MockExtractor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn probe(&self, _url: &Url) -> Result<MediaInfo, ExtractorError> {
        self.probe_calls.fetch_add(1, Ordering::Relaxed);
        self.config.probe.clone()
    }

    async fn fetch(
        &self,
        request: &FetchRequest,
        progress_tx: mpsc::UnboundedSender<FetchProgress>,
    ) -> Result<FetchOutput, ExtractorError> {
        self.fetch_calls.fetch_add(1, Ordering::Relaxed);

        for step in &self.config.steps {
            if !self.config.step_delay.is_zero() {
                sleep(self.config.step_delay).await;
            }
            let _ = progress_tx.send(step.clone());
        }

        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| ExtractorError::Failed("gate closed".to_string()))?;
            permit.forget();
        }

        if self.config.panic_in_fetch {
            panic!("mock extractor crashed mid-download");
        }

        match &self.config.fetch_error {
            Some(err) => Err(err.clone()),
            None => Ok(FetchOutput {
                file_path: request.output_dir.join(&self.config.file_name),
            }),
        }
    }
}
