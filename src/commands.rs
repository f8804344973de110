use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::fs;
use tokio_util::sync::CancellationToken;

use crate::downloader::Downloader;
use crate::profile::AuthProfile;
use crate::progress::{LogLevel, ProgressSink};
use crate::remux;
use crate::state::{DownloadRequest, DEFAULT_CHUNK_SIZE};
use crate::utils::{self, MediaKind};

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub url: String,
    pub output_dir: PathBuf,
    pub headers_file: Option<PathBuf>,
    pub cookies_file: Option<PathBuf>,
    pub no_auth: bool,
    pub chunk_size: u64,
    pub max_forbidden_retries: u32,
    /// `None` classifies by URL extension.
    pub kind: Option<MediaKind>,
    pub remux: bool,
    pub cancel: CancellationToken,
}

impl DownloadOptions {
    pub fn new(url: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            output_dir: output_dir.into(),
            headers_file: None,
            cookies_file: None,
            no_auth: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_forbidden_retries: 10,
            kind: None,
            remux: true,
            cancel: CancellationToken::new(),
        }
    }
}

/// What the caller gets back, success or not. `output_path` is empty on
/// failure; the message is meant for humans (log lines, dialogs).
#[derive(Debug, Clone, Serialize)]
pub struct DownloadOutcome {
    pub success: bool,
    pub output_path: String,
    pub message: String,
}

impl DownloadOutcome {
    fn success(path: &std::path::Path, message: impl Into<String>) -> Self {
        Self {
            success: true,
            output_path: path.to_string_lossy().to_string(),
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output_path: String::new(),
            message: message.into(),
        }
    }
}

/// Public entry point: download one media URL into a directory.
///
/// Never returns an error and never panics the host; every failure is folded
/// into the outcome, and the sink sees exactly one terminal notification.
pub async fn run_download(options: &DownloadOptions, sink: &dyn ProgressSink) -> DownloadOutcome {
    let outcome = match try_download(options, sink).await {
        Ok(outcome) => outcome,
        Err(err) => DownloadOutcome::failure(format!("download error: {:#}", err)),
    };
    sink.finished(outcome.success, &outcome.message);
    outcome
}

async fn try_download(
    options: &DownloadOptions,
    sink: &dyn ProgressSink,
) -> Result<DownloadOutcome> {
    fs::create_dir_all(&options.output_dir)
        .await
        .with_context(|| format!("failed to create output directory {:?}", options.output_dir))?;

    let profile = build_profile(options, sink)?;

    let kind = options
        .kind
        .unwrap_or_else(|| MediaKind::from_url(&options.url));
    sink.log(LogLevel::Info, &format!("detected file type: {}", kind));

    let dest = utils::timestamped_output_path(&options.url, kind, &options.output_dir);
    sink.log(LogLevel::Info, &format!("output file: {}", dest.display()));

    let request = DownloadRequest::new(&options.url, &dest, &profile)
        .with_chunk_size(options.chunk_size);
    let downloader = Downloader::new()
        .with_max_forbidden_retries(options.max_forbidden_retries)
        .with_cancellation(options.cancel.clone());

    if let Err(err) = downloader.fetch(&request, sink).await {
        return Ok(DownloadOutcome::failure(format!("download failed: {}", err)));
    }

    if kind.is_video() && options.remux {
        sink.log(LogLevel::Info, "optimizing video for seeking...");
        match remux::faststart(&dest).await {
            Ok(fixed) => {
                sink.log(LogLevel::Info, &format!("video optimized: {}", fixed.display()));
                return Ok(DownloadOutcome::success(&fixed, "download and optimization complete"));
            }
            Err(err) => {
                sink.log(
                    LogLevel::Warning,
                    &format!("video optimization failed, using original file: {:#}", err),
                );
                return Ok(DownloadOutcome::success(&dest, "download complete (optimization failed)"));
            }
        }
    }

    Ok(DownloadOutcome::success(&dest, "download complete"))
}

fn build_profile(options: &DownloadOptions, sink: &dyn ProgressSink) -> Result<AuthProfile> {
    if options.no_auth {
        sink.log(LogLevel::Info, "using minimal headers (no authentication)");
        return Ok(AuthProfile::minimal());
    }

    let mut profile = AuthProfile::browser();
    if let Some(path) = &options.headers_file {
        profile.merge_headers_file(path)?;
        sink.log(LogLevel::Info, &format!("loaded custom headers from {:?}", path));
    }
    if let Some(path) = &options.cookies_file {
        profile.merge_cookies_file(path)?;
        sink.log(LogLevel::Info, &format!("loaded custom cookies from {:?}", path));
    }
    Ok(profile)
}
