//! `YtDlpExtractor`: the production collaborator, driving the yt-dlp executable.
//!
//! Metadata comes from `--dump-json`. Downloads run with a machine-readable
//! `--progress-template` and print the final file path behind a marker, so
//! both can be picked out of the process output line by line.

use crate::core::config;
use crate::download::error::ExtractorError;
use crate::download::extractor::{FetchOutput, FetchProgress, FetchRequest, FetchStatus, MediaExtractor, MediaInfo};
use crate::download::ytdlp_errors::error_from_stderr;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command as TokioCommand;
use tokio::sync::mpsc;
use tokio::time::timeout;
use url::Url;

const PROGRESS_MARKER: &str = "[dlweb-progress]";
const FILE_MARKER: &str = "[dlweb-file]";

/// stderr lines kept for error reporting
const STDERR_TAIL_LINES: usize = 200;

/// Output file naming: sanitized title plus extension
const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// A classified line of yt-dlp output.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputLine {
    Progress(FetchProgress),
    File(PathBuf),
    Other,
}

/// Download backend powered by yt-dlp.
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    bin: String,
    probe_timeout: Duration,
    download_timeout: Duration,
}

impl Default for YtDlpExtractor {
    fn default() -> Self {
        Self::from_config()
    }
}

impl YtDlpExtractor {
    pub fn new(bin: impl Into<String>, probe_timeout: Duration, download_timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            probe_timeout,
            download_timeout,
        }
    }

    /// Uses YTDL_BIN and the configured timeouts.
    pub fn from_config() -> Self {
        Self::new(
            config::YTDL_BIN.clone(),
            config::download::probe_timeout(),
            config::download::download_timeout(),
        )
    }

    fn spawn_error(&self, err: std::io::Error) -> ExtractorError {
        if err.kind() == std::io::ErrorKind::NotFound {
            ExtractorError::Spawn(format!("yt-dlp executable '{}' was not found", self.bin))
        } else {
            ExtractorError::Spawn(format!("Failed to start '{}': {}", self.bin, err))
        }
    }

    /// Installed yt-dlp version, e.g. `2025.01.15`.
    pub async fn version(&self) -> Result<String, ExtractorError> {
        let output = timeout(
            Duration::from_secs(10),
            TokioCommand::new(&self.bin)
                .arg("--version")
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| ExtractorError::Timeout("yt-dlp --version timed out".to_string()))?
        .map_err(|e| self.spawn_error(e))?;

        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if version.is_empty() {
            return Err(ExtractorError::InvalidOutput(
                "yt-dlp --version produced no output".to_string(),
            ));
        }
        Ok(version)
    }
}

/// Arguments for a download of `request`.
pub fn build_fetch_args(request: &FetchRequest) -> Vec<String> {
    let output = request.output_dir.join(OUTPUT_TEMPLATE);
    vec![
        "--newline".to_string(),
        "--progress".to_string(),
        "--progress-template".to_string(),
        format!(
            "download:{} %(progress.status)s %(progress.downloaded_bytes)s %(progress.total_bytes)s \
             %(progress.total_bytes_estimate)s %(progress.speed)s %(progress.eta)s",
            PROGRESS_MARKER
        ),
        "--no-simulate".to_string(),
        "--print".to_string(),
        format!("after_move:{} %(filepath)s", FILE_MARKER),
        "--format".to_string(),
        request.format_selector.clone(),
        "--output".to_string(),
        output.to_string_lossy().into_owned(),
        "--restrict-filenames".to_string(),
        "--merge-output-format".to_string(),
        "mp4".to_string(),
        "--no-playlist".to_string(),
        "--".to_string(),
        request.url.to_string(),
    ]
}

fn parse_number(field: &str) -> Option<f64> {
    match field {
        "NA" | "None" | "" => None,
        raw => raw.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0),
    }
}

/// Parses the fields of our `--progress-template` line.
fn parse_template_progress(rest: &str) -> Option<FetchProgress> {
    let fields: Vec<&str> = rest.split_whitespace().collect();
    if fields.len() < 6 {
        return None;
    }
    let status = match fields[0] {
        "downloading" => FetchStatus::Downloading,
        "finished" => FetchStatus::Finished,
        _ => return None,
    };
    Some(FetchProgress {
        status,
        downloaded_bytes: parse_number(fields[1]).map(|v| v as u64),
        total_bytes: parse_number(fields[2]).map(|v| v as u64),
        total_bytes_estimate: parse_number(fields[3]).map(|v| v as u64),
        speed: parse_number(fields[4]),
        eta: parse_number(fields[5]).map(|v| v as u64),
    })
}

/// Parses sizes like "10.00MiB" or "500.00KiB/s"
fn parse_size(size_str: &str) -> Option<u64> {
    let size_str = size_str.trim_start_matches('~').trim_end_matches("/s");
    let units = [("GiB", 1024.0 * 1024.0 * 1024.0), ("MiB", 1024.0 * 1024.0), ("KiB", 1024.0), ("B", 1.0)];
    units.iter().find_map(|(suffix, factor)| {
        size_str
            .strip_suffix(suffix)
            .and_then(|n| n.parse::<f64>().ok())
            .map(|n| (n * factor) as u64)
    })
}

/// Parses ETA like "00:10" or "1:02:03"
fn parse_eta(eta_str: &str) -> Option<u64> {
    eta_str
        .split(':')
        .try_fold(0u64, |acc, part| part.parse::<u64>().ok().map(|v| acc * 60 + v))
}

/// Fallback for yt-dlp builds that ignore the template:
/// "[download]  45.2% of 10.00MiB at 500.00KiB/s ETA 00:10"
fn parse_download_line(line: &str) -> Option<FetchProgress> {
    if !line.contains("[download]") || !line.contains('%') {
        return None;
    }
    let parts: Vec<&str> = line.split_whitespace().collect();
    let mut percent = None;
    let mut total = None;
    let mut speed = None;
    let mut eta = None;
    for (i, part) in parts.iter().enumerate() {
        let next = parts.get(i + 1).copied();
        if let Some(p) = part.strip_suffix('%').and_then(|p| p.parse::<f64>().ok()) {
            percent = Some(p.clamp(0.0, 100.0));
        }
        match (*part, next) {
            ("of", Some(value)) => total = parse_size(value),
            ("at", Some(value)) => speed = parse_size(value).map(|v| v as f64),
            ("ETA", Some(value)) => eta = parse_eta(value),
            _ => {}
        }
    }
    let percent = percent?;
    let total = total.unwrap_or(0);
    Some(FetchProgress {
        status: FetchStatus::Downloading,
        downloaded_bytes: Some((total as f64 * percent / 100.0) as u64),
        total_bytes: (total > 0).then_some(total),
        total_bytes_estimate: None,
        speed,
        eta,
    })
}

/// Classifies one line of yt-dlp output.
pub fn parse_output_line(line: &str) -> OutputLine {
    let trimmed = line.trim();
    if let Some(rest) = trimmed.strip_prefix(PROGRESS_MARKER) {
        return parse_template_progress(rest).map_or(OutputLine::Other, OutputLine::Progress);
    }
    if let Some(rest) = trimmed.strip_prefix(FILE_MARKER) {
        let path = rest.trim();
        if !path.is_empty() && path != "NA" {
            return OutputLine::File(PathBuf::from(path));
        }
        return OutputLine::Other;
    }
    parse_download_line(trimmed).map_or(OutputLine::Other, OutputLine::Progress)
}

#[derive(Default)]
struct StreamScan {
    file_path: Option<PathBuf>,
    tail: VecDeque<String>,
}

/// Reads a child pipe to the end, forwarding progress and remembering the
/// reported output file and the last lines seen.
async fn scan_lines<R: AsyncRead + Unpin>(
    reader: Option<R>,
    progress_tx: &mpsc::UnboundedSender<FetchProgress>,
) -> StreamScan {
    let mut scan = StreamScan::default();
    let Some(reader) = reader else {
        return scan;
    };
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                match parse_output_line(&line) {
                    OutputLine::Progress(progress) => {
                        // The receiver only goes away if the runner stopped listening.
                        let _ = progress_tx.send(progress);
                    }
                    OutputLine::File(path) => scan.file_path = Some(path),
                    OutputLine::Other => {
                        log::debug!("yt-dlp: {}", line);
                        scan.tail.push_back(line);
                        if scan.tail.len() > STDERR_TAIL_LINES {
                            scan.tail.pop_front();
                        }
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                log::warn!("Failed to read yt-dlp output: {}", e);
                break;
            }
        }
    }
    scan
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn probe(&self, url: &Url) -> Result<MediaInfo, ExtractorError> {
        let args = ["--dump-json", "--no-playlist", "--no-warnings", "--", url.as_str()];
        log::debug!("yt-dlp command for metadata: {} {}", self.bin, args.join(" "));

        let output = timeout(
            self.probe_timeout,
            TokioCommand::new(&self.bin)
                .args(args)
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| {
            ExtractorError::Timeout(format!(
                "Fetching video information timed out after {}s",
                self.probe_timeout.as_secs()
            ))
        })?
        .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log::warn!("yt-dlp metadata failed for {}: {}", url, stderr.trim());
            return Err(error_from_stderr(&stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let json_line = stdout
            .lines()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| ExtractorError::InvalidOutput("yt-dlp returned no metadata".to_string()))?;
        let info: MediaInfo = serde_json::from_str(json_line)?;
        log::info!(
            "Probed {}: {:?} ({} formats)",
            url,
            info.title.as_deref().unwrap_or("untitled"),
            info.formats.len()
        );
        Ok(info)
    }

    async fn fetch(
        &self,
        request: &FetchRequest,
        progress_tx: mpsc::UnboundedSender<FetchProgress>,
    ) -> Result<FetchOutput, ExtractorError> {
        tokio::fs::create_dir_all(&request.output_dir).await.map_err(|e| {
            ExtractorError::Failed(format!(
                "Cannot create download folder {}: {}",
                request.output_dir.display(),
                e
            ))
        })?;

        let args = build_fetch_args(request);
        log::debug!("yt-dlp command for download: {} {}", self.bin, args.join(" "));

        let mut child = TokioCommand::new(&self.bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let outcome = timeout(self.download_timeout, async {
            let (out, err) = tokio::join!(scan_lines(stdout, &progress_tx), scan_lines(stderr, &progress_tx));
            let status = child.wait().await;
            (out, err, status)
        })
        .await;

        let (out, err, status) = match outcome {
            Ok(result) => result,
            Err(_) => {
                log::error!(
                    "yt-dlp download timed out after {}s, killing",
                    self.download_timeout.as_secs()
                );
                let _ = child.kill().await;
                return Err(ExtractorError::Timeout(format!(
                    "Download timed out after {}s",
                    self.download_timeout.as_secs()
                )));
            }
        };

        let status = status.map_err(|e| ExtractorError::Failed(format!("Failed to wait for yt-dlp: {}", e)))?;
        if !status.success() {
            let stderr_text = err.tail.iter().cloned().collect::<Vec<_>>().join("\n");
            log::warn!("yt-dlp exited with {} for {}", status, request.url);
            return Err(error_from_stderr(&stderr_text));
        }

        out.file_path.or(err.file_path).map(|file_path| FetchOutput { file_path }).ok_or_else(|| {
            ExtractorError::MissingOutput("yt-dlp finished without reporting an output file".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_template_line() {
        let line = "[dlweb-progress] downloading 1048576 NA 4194304.0 524288.5 6";
        match parse_output_line(line) {
            OutputLine::Progress(p) => {
                assert_eq!(p.status, FetchStatus::Downloading);
                assert_eq!(p.downloaded_bytes, Some(1_048_576));
                assert_eq!(p.total_bytes, None);
                assert_eq!(p.total_bytes_estimate, Some(4_194_304));
                assert_eq!(p.speed, Some(524_288.5));
                assert_eq!(p.eta, Some(6));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_template_finished_and_garbage() {
        assert!(matches!(
            parse_output_line("[dlweb-progress] finished 2048 2048 NA NA NA"),
            OutputLine::Progress(FetchProgress {
                status: FetchStatus::Finished,
                ..
            })
        ));
        assert_eq!(parse_output_line("[dlweb-progress] error 1 2"), OutputLine::Other);
        assert_eq!(parse_output_line("[youtube] abc: Downloading webpage"), OutputLine::Other);
    }

    #[test]
    fn test_parse_file_marker() {
        assert_eq!(
            parse_output_line("[dlweb-file] downloads/My_Clip.mp4"),
            OutputLine::File(PathBuf::from("downloads/My_Clip.mp4"))
        );
        assert_eq!(parse_output_line("[dlweb-file] NA"), OutputLine::Other);
    }

    #[test]
    fn test_parse_plain_download_line() {
        let line = "[download]  45.2% of 10.00MiB at 500.00KiB/s ETA 00:10";
        match parse_output_line(line) {
            OutputLine::Progress(p) => {
                assert_eq!(p.total_bytes, Some(10 * 1024 * 1024));
                assert_eq!(p.speed, Some(500.0 * 1024.0));
                assert_eq!(p.eta, Some(10));
                let downloaded = p.downloaded_bytes.unwrap();
                assert!(downloaded > 4_700_000 && downloaded < 4_750_000);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(parse_output_line("[download] Destination: x.mp4"), OutputLine::Other);
    }

    #[test]
    fn test_parse_eta_and_size() {
        assert_eq!(parse_eta("1:02:03"), Some(3723));
        assert_eq!(parse_eta("Unknown"), None);
        assert_eq!(parse_size("~1.50GiB"), Some(1_610_612_736));
        assert_eq!(parse_size("12B"), Some(12));
    }

    #[test]
    fn test_build_fetch_args() {
        let request = FetchRequest {
            url: Url::parse("https://www.youtube.com/watch?v=abc").unwrap(),
            format_selector: "bestaudio/best".to_string(),
            output_dir: PathBuf::from("downloads"),
        };
        let args = build_fetch_args(&request);

        let value_after = |flag: &str| {
            let pos = args.iter().position(|a| a == flag).unwrap();
            args[pos + 1].clone()
        };
        assert_eq!(value_after("--format"), "bestaudio/best");
        assert_eq!(
            PathBuf::from(value_after("--output")),
            PathBuf::from("downloads").join("%(title)s.%(ext)s")
        );
        assert!(args.contains(&"--restrict-filenames".to_string()));
        assert_eq!(args.last().unwrap(), "https://www.youtube.com/watch?v=abc");
        assert_eq!(args[args.len() - 2], "--");
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_spawn_error() {
        let extractor = YtDlpExtractor::new(
            "/nonexistent/yt-dlp-binary",
            Duration::from_secs(5),
            Duration::from_secs(5),
        );
        let url = Url::parse("https://example.com/video").unwrap();
        let err = extractor.probe(&url).await.unwrap_err();
        assert!(matches!(err, ExtractorError::Spawn(_)));
        assert!(err.message().contains("not found"));
    }
}
