use std::fmt;
use std::path::{Path, PathBuf};

use chrono::Local;
use url::Url;

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "wav", "aac", "flac", "ogg"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv", "mov", "webm", "flv"];

/// How downstream processing treats a finished download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    /// Classify by URL extension. Unknown extensions default to video.
    pub fn from_url(url: &str) -> Self {
        let lower = url.to_lowercase();
        let path = lower
            .split(|c| c == '?' || c == '#')
            .next()
            .unwrap_or(&lower);
        if AUDIO_EXTENSIONS.iter().any(|ext| path.ends_with(&format!(".{}", ext))) {
            MediaKind::Audio
        } else {
            MediaKind::Video
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, MediaKind::Video)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// Last non-empty path segment of the URL, percent-decoded.
pub fn filename_from_url(url_str: &str) -> Option<String> {
    let url = Url::parse(url_str).ok()?;
    let segment = url
        .path_segments()?
        .filter(|s| !s.is_empty())
        .next_back()?
        .to_string();
    let decoded = urlencoding::decode(&segment)
        .map(|s| s.into_owned())
        .unwrap_or(segment);
    if decoded.is_empty() {
        None
    } else {
        Some(decoded)
    }
}

pub fn sanitize_filename(filename: &str) -> String {
    filename.replace(
        |c: char| !c.is_alphanumeric() && c != '.' && c != '-' && c != '_',
        "_",
    )
}

/// Destination path for a download: URL basename with a timestamp suffix,
/// sanitized, de-duplicated with a numeric counter. URLs without a usable
/// basename get a generic name for their media kind.
pub fn timestamped_output_path(url: &str, kind: MediaKind, output_dir: &Path) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");

    let filename = match filename_from_url(url) {
        Some(name) => {
            let name = sanitize_filename(&name);
            match name.rsplit_once('.') {
                Some((stem, ext)) if !stem.is_empty() => {
                    format!("{}_{}.{}", stem, timestamp, ext)
                }
                _ => format!("{}_{}", name, timestamp),
            }
        }
        None => match kind {
            MediaKind::Audio => format!("audio_{}.mp3", timestamp),
            MediaKind::Video => format!("video_{}.mp4", timestamp),
        },
    };

    unique_filepath(output_dir, &filename)
}

fn unique_filepath(dir: &Path, filename: &str) -> PathBuf {
    let mut path = dir.join(filename);
    let mut counter = 1;

    while path.exists() {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();

        let next = if extension.is_empty() {
            format!("{}_{}", stem, counter)
        } else {
            format!("{}_{}.{}", stem, counter, extension)
        };

        path = dir.join(next);
        counter += 1;
    }
    path
}
