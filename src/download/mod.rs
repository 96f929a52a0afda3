//! Download orchestration: the collaborator interface and its yt-dlp backend,
//! quality negotiation, progress translation, and the background runner.

pub mod error;
pub mod extractor;
pub mod formats;
pub mod progress;
pub mod runner;
pub mod ytdlp;
pub mod ytdlp_errors;

pub use error::ExtractorError;
pub use extractor::{FetchOutput, FetchProgress, FetchRequest, FetchStatus, FormatVariant, MediaExtractor, MediaInfo};
pub use formats::{select_formats, FormatOption, Quality};
pub use progress::{ProgressRecord, ProgressReporter, ProgressStatus};
pub use runner::{DownloadRunner, RunnerLimits};
pub use ytdlp::YtDlpExtractor;
