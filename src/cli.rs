use clap::{Parser, Subcommand};
use std::net::IpAddr;

#[derive(Parser)]
#[command(name = "dlweb")]
#[command(author, version, about = "Web front-end for downloading videos with live progress", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the web server (default)
    Serve {
        /// Address to listen on (overrides WEB_BIND_ADDR)
        #[arg(short, long)]
        bind: Option<IpAddr>,

        /// Port to listen on (overrides WEB_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List the qualities available for a URL
    Formats {
        /// Video URL
        url: String,

        /// Print the options as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show metadata for a URL
    Info {
        /// Video URL
        url: String,

        /// Print the metadata as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that yt-dlp is installed and print its version
    CheckYtdlp,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
