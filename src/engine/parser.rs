//! Parsers for yt-dlp output
//!
//! Two kinds of output are handled: the single JSON document printed by
//! `--dump-single-json` during discovery, and the line-oriented progress
//! printed with `--newline` during a transfer.

use super::traits::ProgressEvent;
use crate::error::ExtractionError;
use crate::types::{FormatKind, FormatSelector, MediaFormat, MediaInfo};
use regex::Regex;
use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Subset of yt-dlp's info dict used for discovery
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawInfo {
    title: Option<String>,
    thumbnail: Option<String>,
    duration: Option<f64>,
    extractor_key: Option<String>,
    ext: Option<String>,
    #[serde(default)]
    formats: Vec<RawFormat>,
}

/// One entry of the info dict's `formats` array
#[derive(Debug, Default, Clone, Deserialize)]
pub(crate) struct RawFormat {
    format_id: Option<String>,
    ext: Option<String>,
    height: Option<u32>,
    tbr: Option<f64>,
    filesize: Option<f64>,
    filesize_approx: Option<f64>,
    acodec: Option<String>,
    vcodec: Option<String>,
}

impl RawFormat {
    fn size(&self) -> Option<f64> {
        self.filesize.or(self.filesize_approx)
    }

    fn is_audio_only(&self) -> bool {
        self.acodec.as_deref() != Some("none") && self.vcodec.as_deref() == Some("none")
    }
}

/// Parse `--dump-single-json` output into a normalized [`MediaInfo`]
pub(crate) fn parse_media_info(json: &[u8]) -> Result<MediaInfo, ExtractionError> {
    let raw: RawInfo = serde_json::from_slice(json)
        .map_err(|e| ExtractionError::DiscoverFailed(format!("unreadable engine output: {e}")))?;
    Ok(normalize_info(raw))
}

/// Normalize a raw info dict
///
/// Formats are ordered best first by (height, bitrate). One video entry is
/// kept per distinct height, skipping `webm` containers; audio-only streams
/// are all kept. A synthetic "Best Quality" entry always comes first.
pub(crate) fn normalize_info(mut raw: RawInfo) -> MediaInfo {
    raw.formats.sort_by(|a, b| {
        b.height
            .unwrap_or(0)
            .cmp(&a.height.unwrap_or(0))
            .then_with(|| {
                b.tbr
                    .unwrap_or(0.0)
                    .partial_cmp(&a.tbr.unwrap_or(0.0))
                    .unwrap_or(Ordering::Equal)
            })
    });

    let mut formats = vec![MediaFormat {
        resolution: "Best Quality".into(),
        ext: raw.ext.clone().unwrap_or_else(|| "mp4".into()),
        size: "Variable".into(),
        format_id: FormatSelector::BEST.into(),
        kind: FormatKind::Best,
    }];
    let mut seen_heights = HashSet::new();

    for format in &raw.formats {
        let ext = format.ext.clone().unwrap_or_else(|| "unknown".into());
        let format_id = format.format_id.clone().unwrap_or_default();

        match format.height.filter(|h| *h > 0) {
            Some(height) => {
                if ext == "webm" || seen_heights.contains(&height) {
                    continue;
                }
                seen_heights.insert(height);
                formats.push(MediaFormat {
                    resolution: format!("{height}p"),
                    ext,
                    size: format_size(format.size()),
                    format_id,
                    kind: FormatKind::Video,
                });
            }
            None if format.is_audio_only() => {
                formats.push(MediaFormat {
                    resolution: "Audio".into(),
                    ext,
                    size: format_size(format.size()),
                    format_id,
                    kind: FormatKind::Audio,
                });
            }
            None => {}
        }
    }

    MediaInfo {
        title: raw.title.unwrap_or_else(|| "Untitled".into()),
        thumbnail: raw.thumbnail,
        duration: format_duration(raw.duration),
        platform: raw.extractor_key,
        formats,
    }
}

/// Human-readable size with one decimal ("12.3 MB"); "Unknown" when absent
pub fn format_size(bytes: Option<f64>) -> String {
    let Some(mut size) = bytes.filter(|b| b.is_finite() && *b > 0.0) else {
        return "Unknown".into();
    };

    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{size:.1} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.1} TB")
}

/// Duration as "m:ss" or "h:mm:ss"; "0:00" when absent
pub fn format_duration(seconds: Option<f64>) -> String {
    let total = match seconds {
        Some(s) if s.is_finite() && s >= 1.0 => s as u64,
        _ => return "0:00".into(),
    };

    let (minutes, secs) = (total / 60, total % 60);
    let (hours, minutes) = (minutes / 60, minutes % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

fn progress_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::expect_used)]
        Regex::new(r"^\[download\]\s+(\d{1,3}(?:\.\d+)?%)").expect("valid progress regex")
    })
}

/// Interpret one line of transfer output
///
/// Returns `None` for lines that carry no progress information.
pub(crate) fn parse_progress_line(line: &str) -> Option<ProgressEvent> {
    let line = line.trim();

    if let Some(caps) = progress_regex().captures(line) {
        let percent = caps[1].to_string();
        if percent.trim_end_matches('%').parse::<f32>().ok() == Some(100.0) {
            return Some(ProgressEvent::Finished);
        }
        return Some(ProgressEvent::Downloading { percent });
    }

    if line.starts_with("[Merger]")
        || (line.starts_with("[download]") && line.ends_with("has already been downloaded"))
    {
        return Some(ProgressEvent::Finished);
    }

    None
}

/// Whether a line is engine chatter rather than a printed field
pub(crate) fn is_status_line(line: &str) -> bool {
    let line = line.trim_start();
    line.starts_with('[') || line.starts_with("WARNING:") || line.starts_with("ERROR:")
}
