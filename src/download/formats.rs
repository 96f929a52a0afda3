use crate::download::extractor::{FormatVariant, MediaInfo};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// One selectable quality offered to the user, the best variant for its height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatOption {
    /// Display label, e.g. "720p"
    pub quality: String,
    pub format_id: String,
    pub ext: String,
    /// Size in bytes, 0 when unknown
    pub filesize: u64,
    pub height: u64,
}

fn variant_size(format: &FormatVariant) -> u64 {
    format.filesize.or(format.filesize_approx).unwrap_or(0)
}

fn is_video(format: &FormatVariant) -> bool {
    format.vcodec.as_deref() != Some("none")
}

/// Picks the best variant per distinct height and sorts by height, highest first.
///
/// Audio-only variants and variants without a height are ignored. Among
/// variants of the same height the largest known size wins; on a tie the
/// earlier variant is kept.
pub fn select_formats(info: &MediaInfo) -> Vec<FormatOption> {
    let mut by_height: HashMap<u64, FormatOption> = HashMap::new();

    for format in &info.formats {
        let height = match format.height {
            Some(h) if h > 0 => h,
            _ => continue,
        };
        if !is_video(format) {
            continue;
        }

        let filesize = variant_size(format);
        let replace = by_height.get(&height).map_or(true, |existing| filesize > existing.filesize);
        if replace {
            by_height.insert(
                height,
                FormatOption {
                    quality: format!("{}p", height),
                    format_id: format.format_id.clone(),
                    ext: format.ext.clone().unwrap_or_else(|| "mp4".to_string()),
                    filesize,
                    height,
                },
            );
        }
    }

    let mut ordered: Vec<FormatOption> = by_height.into_values().collect();
    ordered.sort_by(|a, b| b.height.cmp(&a.height));
    ordered
}

/// Quality requested for a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
    /// Best single-file format
    #[default]
    Best,
    /// Best audio track
    Audio,
    /// At most this many vertical pixels
    MaxHeight(u32),
}

impl Quality {
    /// yt-dlp format selector for this quality.
    ///
    /// Height-limited selections prefer a single muxed file, then a
    /// video+audio merge, then whatever is best.
    pub fn format_selector(&self) -> String {
        match self {
            Quality::Best => "best".to_string(),
            Quality::Audio => "bestaudio/best".to_string(),
            Quality::MaxHeight(h) => format!("best[height<={h}]/bestvideo[height<={h}]+bestaudio/best"),
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::Best => write!(f, "best"),
            Quality::Audio => write!(f, "audio"),
            Quality::MaxHeight(h) => write!(f, "{}p", h),
        }
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().to_ascii_lowercase();
        match value.as_str() {
            "" | "best" => Ok(Quality::Best),
            "audio" => Ok(Quality::Audio),
            other => other
                .strip_suffix('p')
                .and_then(|digits| digits.parse::<u32>().ok())
                .filter(|h| *h > 0)
                .map(Quality::MaxHeight)
                .ok_or_else(|| format!("Invalid quality '{}': expected best, audio or e.g. 720p", s.trim())),
        }
    }
}
