//! Background execution of downloads.
//!
//! `DownloadRunner::start` admits a download, registers its session and
//! returns immediately; the transfer itself runs on a detached tokio task.
//! Two semaphores bound the work: one limits transfers running at once, the
//! other limits how many downloads may be admitted (running or waiting).

use crate::core::error::AppError;
use crate::core::utils::file_name_of;
use crate::download::extractor::{parse_media_url, FetchOutput, FetchRequest, MediaExtractor};
use crate::download::formats::Quality;
use crate::download::progress::ProgressReporter;
use crate::storage::sessions::SessionStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};

/// Limits applied by the runner.
#[derive(Debug, Clone)]
pub struct RunnerLimits {
    /// Transfers running at the same time
    pub max_concurrent: usize,
    /// Downloads admitted at the same time (running + waiting)
    pub max_queued: usize,
}

/// Spawns downloads and records their outcome in the session registry.
#[derive(Clone)]
pub struct DownloadRunner {
    extractor: Arc<dyn MediaExtractor>,
    sessions: SessionStore,
    output_dir: PathBuf,
    slots: Arc<Semaphore>,
    admission: Arc<Semaphore>,
    admission_total: usize,
}

impl DownloadRunner {
    pub fn new(
        extractor: Arc<dyn MediaExtractor>,
        sessions: SessionStore,
        output_dir: PathBuf,
        limits: RunnerLimits,
    ) -> Self {
        let max_concurrent = limits.max_concurrent.max(1);
        let max_queued = limits.max_queued.max(max_concurrent);
        Self {
            extractor,
            sessions,
            output_dir,
            slots: Arc::new(Semaphore::new(max_concurrent)),
            admission: Arc::new(Semaphore::new(max_queued)),
            admission_total: max_queued,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Admitted downloads that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.admission_total.saturating_sub(self.admission.available_permits())
    }

    /// Admits a download and returns its session id.
    ///
    /// The URL is validated by the background task, so a bad link ends up as
    /// an `error` record on the session rather than an HTTP failure.
    pub fn start(&self, url: &str, quality: Quality) -> Result<String, AppError> {
        let admission = Arc::clone(&self.admission).try_acquire_owned().map_err(|_| {
            log::warn!("Download rejected: {} downloads already admitted", self.in_flight());
            AppError::Busy
        })?;

        let session_id = self.sessions.create();
        log::info!("Session {} admitted: {} ({})", session_id, url, quality);

        let job = DownloadJob {
            session_id: session_id.clone(),
            url: url.to_string(),
            quality,
            extractor: Arc::clone(&self.extractor),
            sessions: self.sessions.clone(),
            output_dir: self.output_dir.clone(),
            slots: Arc::clone(&self.slots),
        };
        tokio::spawn(job.run(admission));

        Ok(session_id)
    }
}

struct DownloadJob {
    session_id: String,
    url: String,
    quality: Quality,
    extractor: Arc<dyn MediaExtractor>,
    sessions: SessionStore,
    output_dir: PathBuf,
    slots: Arc<Semaphore>,
}

impl DownloadJob {
    /// Runs the transfer and guarantees a terminal record, even if the
    /// transfer task panics.
    async fn run(self, _admission: OwnedSemaphorePermit) {
        let session_id = self.session_id.clone();
        let sessions = self.sessions.clone();

        let transfer = tokio::spawn(self.transfer());
        if let Err(join_err) = transfer.await {
            log::error!("Session {} download task crashed: {}", session_id, join_err);
            let mut reporter = ProgressReporter::resume(session_id, sessions);
            if !reporter.last().is_terminal() {
                reporter.fail("Internal error while downloading");
            }
        }
    }

    async fn transfer(self) {
        let mut reporter = ProgressReporter::new(self.session_id.clone(), self.sessions.clone());

        let _slot = match Arc::clone(&self.slots).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                reporter.fail("Download service is shutting down");
                return;
            }
        };

        let url = match parse_media_url(&self.url) {
            Ok(url) => url,
            Err(e) => {
                log::warn!("Session {} rejected URL: {}", self.session_id, e);
                reporter.fail(e.to_string());
                return;
            }
        };

        let request = FetchRequest {
            url,
            format_selector: self.quality.format_selector(),
            output_dir: self.output_dir.clone(),
        };

        let started = Instant::now();
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
        let fetch = self.extractor.fetch(&request, progress_tx);
        let forward = async {
            while let Some(event) = progress_rx.recv().await {
                reporter.report(&event);
            }
        };
        let (result, ()) = tokio::join!(fetch, forward);

        match result {
            Ok(FetchOutput { file_path }) => {
                let filename = file_name_of(&file_path);
                log::info!(
                    "Session {} finished in {:.1}s: {}",
                    self.session_id,
                    started.elapsed().as_secs_f64(),
                    file_path.display()
                );
                reporter.complete(filename, format!("Download completed in {} quality!", self.quality));
            }
            Err(e) => {
                log::error!(
                    "Session {} failed via {} [{}]: {}",
                    self.session_id,
                    self.extractor.name(),
                    e.category(),
                    e
                );
                reporter.fail(e.to_string());
            }
        }
    }
}
