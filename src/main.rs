use anyhow::Result;
use dotenvy::dotenv;
use serde_json::json;
use std::sync::Arc;

use dlweb::cli::{Cli, Commands};
use dlweb::core::utils::{format_duration, format_file_size};
use dlweb::core::{config, init_logger, log_web_configuration, WebConfig};
use dlweb::download::extractor::{parse_media_url, MediaExtractor};
use dlweb::download::formats::select_formats;
use dlweb::download::YtDlpExtractor;
use dlweb::web::start_web_server;

/// Entry point: parses CLI arguments and dispatches to the subcommand.
///
/// # Errors
/// Returns an error if logging cannot be initialized, the server cannot bind,
/// or a one-shot command fails.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Load environment variables from .env if present
    let _ = dotenv();

    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
        if let Some(msg) = panic_info.payload().downcast_ref::<&str>() {
            log::error!("Panic message: {}", msg);
        }
    }));

    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command {
        Some(Commands::Serve { bind, port }) => {
            run_server(WebConfig::from_env().with_listen(bind, port)).await
        }
        Some(Commands::Formats { url, json }) => run_cli_formats(url, json).await,
        Some(Commands::Info { url, json }) => run_cli_info(url, json).await,
        Some(Commands::CheckYtdlp) => run_check_ytdlp().await,
        None => {
            log::info!("No command specified, starting web server");
            run_server(WebConfig::from_env()).await
        }
    }
}

async fn run_server(config: WebConfig) -> Result<()> {
    log_web_configuration(&config);

    let extractor = YtDlpExtractor::from_config();
    match extractor.version().await {
        Ok(version) => log::info!("Using yt-dlp {} ({})", version, *config::YTDL_BIN),
        Err(e) => log::warn!("yt-dlp check failed, downloads will fail until it is installed: {}", e),
    }

    start_web_server(config, Arc::new(extractor)).await
}

async fn run_cli_formats(url: String, json: bool) -> Result<()> {
    let url = parse_media_url(&url)?;
    let info = YtDlpExtractor::from_config().probe(&url).await?;
    let formats = select_formats(&info);

    if json {
        println!("{}", serde_json::to_string_pretty(&formats)?);
        return Ok(());
    }

    println!("Formats for {}", info.title.as_deref().unwrap_or("(untitled)"));
    if formats.is_empty() {
        println!("  no video formats with a known resolution");
    }
    for f in &formats {
        println!("  {:>6}  {:<5} {:>10}  id={}", f.quality, f.ext, format_file_size(f.filesize), f.format_id);
    }
    Ok(())
}

async fn run_cli_info(url: String, json: bool) -> Result<()> {
    let url = parse_media_url(&url)?;
    let info = YtDlpExtractor::from_config().probe(&url).await?;

    if json {
        let body = json!({
            "title": info.title,
            "duration": info.duration,
            "thumbnail": info.thumbnail,
            "uploader": info.uploader,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!("Title:     {}", info.title.as_deref().unwrap_or("-"));
    println!("Uploader:  {}", info.uploader.as_deref().unwrap_or("-"));
    println!(
        "Duration:  {}",
        info.duration
            .map(|d| format_duration(d.round() as u64))
            .unwrap_or_else(|| "-".to_string())
    );
    println!("Thumbnail: {}", info.thumbnail.as_deref().unwrap_or("-"));
    println!("Formats:   {}", info.formats.len());
    Ok(())
}

async fn run_check_ytdlp() -> Result<()> {
    let version = YtDlpExtractor::from_config().version().await?;
    println!("yt-dlp {} ({})", version, *config::YTDL_BIN);
    Ok(())
}
