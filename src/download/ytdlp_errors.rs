//! Classification of yt-dlp failures into user-facing errors.

use crate::core::utils::truncate_utf8;
use crate::download::error::ExtractorError;

/// Longest collaborator message passed through to clients.
const MAX_MESSAGE_BYTES: usize = 400;

/// Kinds of yt-dlp failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YtDlpErrorType {
    /// No extractor for the URL, or the URL is malformed
    UnsupportedUrl,
    /// Video is private, removed or region-locked
    VideoUnavailable,
    /// The site blocked the request as automated
    BotDetection,
    /// Timeouts, resets, DNS failures
    NetworkError,
    /// Anything else
    Unknown,
}

/// Determines the error type from yt-dlp stderr
pub fn analyze_ytdlp_error(stderr: &str) -> YtDlpErrorType {
    let stderr_lower = stderr.to_lowercase();

    if stderr_lower.contains("unsupported url")
        || stderr_lower.contains("is not a valid url")
        || stderr_lower.contains("no video formats found")
    {
        return YtDlpErrorType::UnsupportedUrl;
    }

    if stderr_lower.contains("private video")
        || stderr_lower.contains("video unavailable")
        || stderr_lower.contains("this video is not available")
        || stderr_lower.contains("video is private")
        || stderr_lower.contains("video has been removed")
        || stderr_lower.contains("this video does not exist")
        || stderr_lower.contains("http error 404")
    {
        return YtDlpErrorType::VideoUnavailable;
    }

    if stderr_lower.contains("sign in to confirm you're not a bot")
        || stderr_lower.contains("bot detection")
        || stderr_lower.contains("http error 403")
        || stderr_lower.contains("http error 429")
    {
        return YtDlpErrorType::BotDetection;
    }

    if stderr_lower.contains("timed out")
        || stderr_lower.contains("timeout")
        || stderr_lower.contains("connection")
        || stderr_lower.contains("network is unreachable")
        || stderr_lower.contains("name or service not known")
        || stderr_lower.contains("temporary failure in name resolution")
        || stderr_lower.contains("failed to connect")
    {
        return YtDlpErrorType::NetworkError;
    }

    YtDlpErrorType::Unknown
}

/// Generic message for an error type, used when yt-dlp printed nothing useful
pub fn get_error_message(error_type: YtDlpErrorType) -> &'static str {
    match error_type {
        YtDlpErrorType::UnsupportedUrl => "This URL is not supported.",
        YtDlpErrorType::VideoUnavailable => "The video is unavailable: it may be private, removed or region-locked.",
        YtDlpErrorType::BotDetection => "The site blocked the request. Try again later.",
        YtDlpErrorType::NetworkError => "Network problem while contacting the site. Try again in a minute.",
        YtDlpErrorType::Unknown => "Failed to process the video. Check that the link is correct.",
    }
}

/// The last `ERROR:` line yt-dlp printed, without the prefix.
pub fn last_error_line(stderr: &str) -> Option<&str> {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("ERROR:"))
        .map(str::trim)
        .filter(|line| !line.is_empty())
}

/// Builds the error for a failed yt-dlp run from its stderr.
///
/// Prefers yt-dlp's own last `ERROR:` line; falls back to a generic message
/// for the detected error type.
pub fn error_from_stderr(stderr: &str) -> ExtractorError {
    let error_type = analyze_ytdlp_error(stderr);
    let message = last_error_line(stderr)
        .map(|line| truncate_utf8(line, MAX_MESSAGE_BYTES))
        .unwrap_or_else(|| get_error_message(error_type).to_string());

    match error_type {
        YtDlpErrorType::UnsupportedUrl => ExtractorError::UnsupportedUrl(message),
        YtDlpErrorType::VideoUnavailable | YtDlpErrorType::BotDetection => ExtractorError::Unavailable(message),
        YtDlpErrorType::NetworkError => ExtractorError::Network(message),
        YtDlpErrorType::Unknown => ExtractorError::Failed(message),
    }
}
