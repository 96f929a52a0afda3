//! Progress records and the reporter that fills them from collaborator events.

use crate::download::extractor::{FetchProgress, FetchStatus};
use crate::storage::sessions::SessionStore;
use serde::{Deserialize, Serialize};

/// Lifecycle stage of a download session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Starting,
    Downloading,
    Finished,
    Error,
}

impl ProgressStatus {
    /// `finished` and `error` end a session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressStatus::Finished | ProgressStatus::Error)
    }
}

/// Current known state of a session's download, as sent to the browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub status: ProgressStatus,
    /// 0-100, one decimal
    pub percentage: f64,
    pub downloaded: u64,
    /// 0 when unknown
    pub total: u64,
    /// Bytes per second
    pub speed: Option<f64>,
    /// Seconds remaining
    pub eta: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressRecord {
    pub fn starting() -> Self {
        Self {
            status: ProgressStatus::Starting,
            percentage: 0.0,
            downloaded: 0,
            total: 0,
            speed: None,
            eta: None,
            filename: None,
            message: None,
            error: None,
        }
    }

    pub fn finished(downloaded: u64, filename: String, message: String) -> Self {
        Self {
            status: ProgressStatus::Finished,
            percentage: 100.0,
            downloaded,
            total: downloaded,
            speed: None,
            eta: None,
            filename: Some(filename),
            message: Some(message),
            error: None,
        }
    }

    /// Terminal error record; an empty message is replaced by a generic one.
    pub fn failed(error: impl Into<String>) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = "Download failed".to_string();
        }
        Self {
            status: ProgressStatus::Error,
            error: Some(error),
            ..Self::starting()
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Translates collaborator progress events into the session's record.
///
/// Percentages never go backwards: yt-dlp restarts its counters for every
/// part of a merged download, so each new value is floored at the highest
/// one already reported.
pub struct ProgressReporter {
    session_id: String,
    sessions: SessionStore,
    last: ProgressRecord,
}

impl ProgressReporter {
    pub fn new(session_id: impl Into<String>, sessions: SessionStore) -> Self {
        Self {
            session_id: session_id.into(),
            sessions,
            last: ProgressRecord::starting(),
        }
    }

    /// Continues reporting for a session from the record currently stored for it.
    pub fn resume(session_id: impl Into<String>, sessions: SessionStore) -> Self {
        let session_id = session_id.into();
        let last = sessions.get(&session_id).unwrap_or_else(ProgressRecord::starting);
        Self {
            session_id,
            sessions,
            last,
        }
    }

    /// The most recent record written by this reporter.
    pub fn last(&self) -> &ProgressRecord {
        &self.last
    }

    /// Builds the record for `event` without storing it.
    pub fn translate(&self, event: &FetchProgress) -> ProgressRecord {
        let downloaded = event.downloaded_bytes.unwrap_or(0);
        let floor = self.last.percentage;

        match event.status {
            FetchStatus::Downloading => {
                let total = event.total_bytes.or(event.total_bytes_estimate).unwrap_or(0);
                let percentage = if total > 0 {
                    round_one_decimal((downloaded as f64 / total as f64) * 100.0)
                } else {
                    floor
                };
                ProgressRecord {
                    status: ProgressStatus::Downloading,
                    percentage: percentage.clamp(0.0, 100.0).max(floor),
                    downloaded,
                    total,
                    speed: event.speed.filter(|s| s.is_finite() && *s >= 0.0),
                    eta: event.eta,
                    filename: None,
                    message: None,
                    error: None,
                }
            }
            // One part is on disk; the session only finishes once the
            // collaborator call returns with the final file.
            FetchStatus::Finished => ProgressRecord {
                status: ProgressStatus::Downloading,
                percentage: 100.0,
                downloaded,
                total: downloaded,
                speed: None,
                eta: Some(0),
                filename: None,
                message: Some("Processing download...".to_string()),
                error: None,
            },
        }
    }

    /// Translates and stores the record for `event`.
    pub fn report(&mut self, event: &FetchProgress) {
        let record = self.translate(event);
        log::debug!(
            "Session {} progress: {:.1}% ({} / {} bytes)",
            self.session_id,
            record.percentage,
            record.downloaded,
            record.total
        );
        self.store(record);
    }

    /// Stores the terminal record for this session.
    pub fn complete(&mut self, filename: String, message: String) {
        let record = ProgressRecord::finished(self.last.downloaded.max(self.last.total), filename, message);
        self.store(record);
    }

    /// Stores a terminal error record, keeping the last known counters.
    pub fn fail(&mut self, error: impl Into<String>) {
        let mut record = ProgressRecord::failed(error);
        record.percentage = self.last.percentage;
        record.downloaded = self.last.downloaded;
        record.total = self.last.total;
        self.store(record);
    }

    fn store(&mut self, record: ProgressRecord) {
        if !self.sessions.set(&self.session_id, record.clone()) {
            log::warn!("Session {} vanished before progress could be stored", self.session_id);
        }
        self.last = record;
    }
}
