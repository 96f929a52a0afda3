//! Logging initialization and startup diagnostics

use anyhow::Result;
use simplelog::*;
use std::fs::File;

use crate::core::config::WebConfig;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs the effective web configuration at startup
pub fn log_web_configuration(config: &WebConfig) {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("Listen address:        http://{}", config.bind_addr);
    log::info!("Download folder:       {}", config.output_dir.display());
    log::info!("Concurrent downloads:  {}", config.max_concurrent_downloads);
    log::info!("Admitted downloads:    {}", config.max_queued_downloads);
    log::info!("Progress idle timeout: {}s", config.idle_timeout.as_secs());
    log::info!("Session TTL:           {}s", config.session_ttl.as_secs());
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
