use thiserror::Error;

/// Structured error type for collaborator (yt-dlp) operations.
///
/// Every variant carries a message that is safe to show to the user as-is.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractorError {
    /// The URL is malformed or no extractor handles it
    #[error("{0}")]
    UnsupportedUrl(String),
    /// Media exists but cannot be fetched (private, removed, geo-blocked)
    #[error("{0}")]
    Unavailable(String),
    /// Connection, DNS or socket failures
    #[error("{0}")]
    Network(String),
    /// The collaborator did not finish in time
    #[error("{0}")]
    Timeout(String),
    /// The collaborator binary could not be started
    #[error("{0}")]
    Spawn(String),
    /// The collaborator produced output we could not understand
    #[error("{0}")]
    InvalidOutput(String),
    /// The download finished but no output file was reported
    #[error("{0}")]
    MissingOutput(String),
    /// Any other collaborator failure
    #[error("{0}")]
    Failed(String),
}

impl ExtractorError {
    /// Short category name used in logs
    pub fn category(&self) -> &'static str {
        match self {
            ExtractorError::UnsupportedUrl(_) => "unsupported_url",
            ExtractorError::Unavailable(_) => "unavailable",
            ExtractorError::Network(_) => "network",
            ExtractorError::Timeout(_) => "timeout",
            ExtractorError::Spawn(_) => "spawn",
            ExtractorError::InvalidOutput(_) => "invalid_output",
            ExtractorError::MissingOutput(_) => "missing_output",
            ExtractorError::Failed(_) => "failed",
        }
    }

    /// Returns the inner message
    pub fn message(&self) -> &str {
        match self {
            ExtractorError::UnsupportedUrl(msg)
            | ExtractorError::Unavailable(msg)
            | ExtractorError::Network(msg)
            | ExtractorError::Timeout(msg)
            | ExtractorError::Spawn(msg)
            | ExtractorError::InvalidOutput(msg)
            | ExtractorError::MissingOutput(msg)
            | ExtractorError::Failed(msg) => msg,
        }
    }
}

impl From<serde_json::Error> for ExtractorError {
    fn from(err: serde_json::Error) -> Self {
        ExtractorError::InvalidOutput(format!("Failed to parse yt-dlp metadata: {}", err))
    }
}
