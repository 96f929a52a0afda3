//! dlweb - web front-end for downloading videos through yt-dlp
//!
//! A browser submits a link, picks a quality and watches a live progress bar
//! while the download runs in the background.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging and small helpers
//! - `storage`: the in-memory download session registry
//! - `download`: yt-dlp integration, quality negotiation, progress and the runner
//! - `web`: axum router, JSON handlers and the SSE progress stream

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod cli;
pub mod core;
pub mod download;
pub mod storage;
pub mod web;

// Re-export commonly used types for convenience
pub use core::{config, AppError, WebConfig};
pub use download::{DownloadRunner, MediaExtractor, ProgressRecord, YtDlpExtractor};
pub use storage::SessionStore;
pub use web::{router, start_web_server, AppState};
