use once_cell::sync::Lazy;
use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Reads an environment variable and parses it, falling back to `default`
/// when the variable is unset, empty, or not parseable.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                log::warn!("Ignoring invalid value for {}: {:?}", name, raw);
                default
            }
        },
        _ => default,
    }
}

/// Cached yt-dlp binary path
/// Read once at startup from YTDL_BIN environment variable or defaults to "yt-dlp"
pub static YTDL_BIN: Lazy<String> = Lazy::new(|| env::var("YTDL_BIN").unwrap_or_else(|_| "yt-dlp".to_string()));

/// Download folder path
/// Read from DOWNLOAD_FOLDER environment variable, defaults to ./downloads
/// Supports tilde (~) expansion for home directory
pub static DOWNLOAD_FOLDER: Lazy<String> = Lazy::new(|| {
    let raw = env::var("DOWNLOAD_FOLDER").unwrap_or_else(|_| "downloads".to_string());
    shellexpand::tilde(&raw).into_owned()
});

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: dlweb.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "dlweb.log".to_string()));

/// Web server configuration
pub mod web {
    use super::*;

    /// Interface to bind, WEB_BIND_ADDR (default 127.0.0.1)
    pub static BIND_ADDR: Lazy<IpAddr> = Lazy::new(|| env_or("WEB_BIND_ADDR", IpAddr::V4(Ipv4Addr::LOCALHOST)));

    /// Listening port, WEB_PORT (default 5000)
    pub static PORT: Lazy<u16> = Lazy::new(|| env_or("WEB_PORT", 5000));
}

/// Download admission configuration
pub mod queue {
    use super::*;

    /// Maximum number of transfers running at the same time
    pub static MAX_CONCURRENT_DOWNLOADS: Lazy<usize> = Lazy::new(|| env_or("MAX_CONCURRENT_DOWNLOADS", 3).max(1));

    /// Maximum number of admitted downloads (running + waiting for a slot).
    /// Requests beyond this are rejected.
    pub static MAX_QUEUED_DOWNLOADS: Lazy<usize> = Lazy::new(|| {
        env_or("MAX_QUEUED_DOWNLOADS", 16).max(*MAX_CONCURRENT_DOWNLOADS)
    });
}

/// yt-dlp invocation configuration
pub mod download {
    use super::*;

    /// Timeout for metadata probes (in seconds)
    pub static YTDLP_PROBE_TIMEOUT_SECS: Lazy<u64> = Lazy::new(|| env_or("YTDLP_PROBE_TIMEOUT_SECS", 120));

    /// Timeout for a whole download (in seconds)
    pub static YTDLP_DOWNLOAD_TIMEOUT_SECS: Lazy<u64> = Lazy::new(|| env_or("YTDLP_DOWNLOAD_TIMEOUT_SECS", 3600));

    pub fn probe_timeout() -> Duration {
        Duration::from_secs(*YTDLP_PROBE_TIMEOUT_SECS)
    }

    pub fn download_timeout() -> Duration {
        Duration::from_secs(*YTDLP_DOWNLOAD_TIMEOUT_SECS)
    }
}

/// Progress session configuration
pub mod progress {
    use super::*;

    /// A stream with no record change for this long ends with an error event
    pub static IDLE_TIMEOUT_SECS: Lazy<u64> = Lazy::new(|| env_or("PROGRESS_IDLE_TIMEOUT_SECS", 1800));

    /// Finished sessions nobody streamed are dropped after this long
    pub static SESSION_TTL_SECS: Lazy<u64> = Lazy::new(|| env_or("SESSION_TTL_SECS", 600));

    /// How often the session reaper runs
    pub static REAP_INTERVAL_SECS: Lazy<u64> = Lazy::new(|| env_or("SESSION_REAP_INTERVAL_SECS", 60));
}

/// Runtime configuration of the web front-end, assembled from the statics above.
///
/// Kept as a plain value so tests and the CLI can override individual fields.
#[derive(Debug, Clone)]
pub struct WebConfig {
    pub bind_addr: SocketAddr,
    pub output_dir: PathBuf,
    pub max_concurrent_downloads: usize,
    pub max_queued_downloads: usize,
    pub idle_timeout: Duration,
    pub session_ttl: Duration,
    pub reap_interval: Duration,
}

impl WebConfig {
    pub fn from_env() -> Self {
        Self {
            bind_addr: SocketAddr::new(*web::BIND_ADDR, *web::PORT),
            output_dir: PathBuf::from(&*DOWNLOAD_FOLDER),
            max_concurrent_downloads: *queue::MAX_CONCURRENT_DOWNLOADS,
            max_queued_downloads: *queue::MAX_QUEUED_DOWNLOADS,
            idle_timeout: Duration::from_secs(*progress::IDLE_TIMEOUT_SECS),
            session_ttl: Duration::from_secs(*progress::SESSION_TTL_SECS),
            reap_interval: Duration::from_secs(*progress::REAP_INTERVAL_SECS),
        }
    }

    /// Overrides the listen address (CLI `--bind` / `--port`).
    pub fn with_listen(mut self, bind: Option<IpAddr>, port: Option<u16>) -> Self {
        if let Some(ip) = bind {
            self.bind_addr.set_ip(ip);
        }
        if let Some(port) = port {
            self.bind_addr.set_port(port);
        }
        self
    }
}
