use std::time::Duration;

use futures::StreamExt;
use indicatif::HumanBytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_RANGE, COOKIE, RANGE};
use reqwest::{Client, Response, StatusCode};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::FetchError;
use crate::profile::AuthProfile;
use crate::progress::{LogLevel, ProgressEvent, ProgressSink};
use crate::state::{ChunkRange, DownloadRequest};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_FORBIDDEN_RETRIES: u32 = 10;

/// Sequential resumable fetcher. One download at a time, one request in
/// flight at a time; the partial file on disk is the only resume state.
pub struct Downloader {
    client: Client,
    max_forbidden_retries: u32,
    cancel: CancellationToken,
}

impl Downloader {
    pub fn new() -> Self {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            max_forbidden_retries: DEFAULT_FORBIDDEN_RETRIES,
            cancel: CancellationToken::new(),
        }
    }

    /// Cap on consecutive 403 responses for a single range before the
    /// download is declared dead.
    pub fn with_max_forbidden_retries(mut self, max: u32) -> Self {
        self.max_forbidden_retries = max.max(1);
        self
    }

    /// Token checked once per chunk iteration, never mid-write, so a
    /// cancelled download always leaves a resumable file behind.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run the chunked path; hand off to the single-pass fallback when it
    /// fails in a way the fallback can still help with.
    pub async fn fetch(
        &self,
        request: &DownloadRequest,
        sink: &dyn ProgressSink,
    ) -> Result<(), FetchError> {
        match self.fetch_chunked(request, sink).await {
            Err(err) if err.triggers_fallback() => {
                sink.log(
                    LogLevel::Warning,
                    &format!("resumable download failed: {}; trying fallback", err),
                );
                self.fetch_fallback(request, sink).await
            }
            other => other,
        }
    }

    async fn fetch_chunked(
        &self,
        request: &DownloadRequest,
        sink: &dyn ProgressSink,
    ) -> Result<(), FetchError> {
        let total = self.probe_size(request).await?;
        sink.log(
            LogLevel::Info,
            &format!("remote size: {} bytes ({})", total, HumanBytes(total)),
        );

        let mut downloaded = resume_offset(request).await;
        if downloaded > 0 {
            sink.log(
                LogLevel::Info,
                &format!("resuming from {} ({})", downloaded, HumanBytes(downloaded)),
            );
        }
        if downloaded > total {
            sink.log(
                LogLevel::Warning,
                "local file is larger than the remote resource; nothing to fetch",
            );
        }

        let mut file = open_destination(request, downloaded).await?;

        while downloaded < total {
            if self.cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            let range = ChunkRange::next(downloaded, total, request.chunk_size);
            let response = self.ranged_get(request, &range, sink).await?;

            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let bytes = chunk?;
                file.write_all(&bytes).await?;
            }
            // the on-disk size is the resume checkpoint, so settle it before
            // asking for the next range
            file.flush().await?;

            downloaded = range.end + 1;
            let event = ProgressEvent::download(
                downloaded,
                total,
                format!(
                    "downloaded {} / {} ({:.1}%)",
                    HumanBytes(downloaded),
                    HumanBytes(total),
                    downloaded as f64 / total as f64 * 100.0
                ),
            );
            sink.progress(&event);
        }

        sink.log(LogLevel::Info, "download complete");
        Ok(())
    }

    /// Issue the ranged GET for one chunk, absorbing 403s up to the retry
    /// cap. Returns the first 200/206 response, still unread.
    async fn ranged_get(
        &self,
        request: &DownloadRequest,
        range: &ChunkRange,
        sink: &dyn ProgressSink,
    ) -> Result<Response, FetchError> {
        let mut attempts = 0u32;

        loop {
            let response = self
                .client
                .get(&request.url)
                .headers(base_headers(request))
                .header(RANGE, range.header_value())
                .send()
                .await?;

            match response.status() {
                StatusCode::OK | StatusCode::PARTIAL_CONTENT => return Ok(response),
                StatusCode::FORBIDDEN => {
                    attempts += 1;
                    if attempts >= self.max_forbidden_retries {
                        return Err(FetchError::Forbidden {
                            range: range.header_value(),
                            attempts,
                        });
                    }
                    sink.log(
                        LogLevel::Warning,
                        &format!(
                            "access forbidden (403), retrying range {} ({}/{})",
                            range.header_value(),
                            attempts,
                            self.max_forbidden_retries
                        ),
                    );
                }
                status => return Err(FetchError::Status { status }),
            }
        }
    }

    /// Determine the total size with a `Range: bytes=0-` probe. The body is
    /// never read; dropping the response aborts it.
    async fn probe_size(&self, request: &DownloadRequest) -> Result<u64, FetchError> {
        let response = self
            .client
            .get(&request.url)
            .headers(base_headers(request))
            .header(RANGE, "bytes=0-")
            .send()
            .await?;

        let status = response.status();
        debug!(%status, url = %request.url, "size probe response");

        if status == StatusCode::OK || status == StatusCode::PARTIAL_CONTENT {
            let headers = response.headers();
            if let Some(value) = headers.get(CONTENT_RANGE) {
                return value
                    .to_str()
                    .ok()
                    .and_then(parse_content_range_total)
                    .ok_or_else(|| FetchError::SizeUnknown {
                        url: request.url.clone(),
                    });
            }
            if let Some(total) = headers
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
            {
                return Ok(total);
            }
        }

        Err(FetchError::SizeUnknown {
            url: request.url.clone(),
        })
    }

    /// Last resort: one unranged GET streamed into a truncated destination.
    /// No resume, no chunk-level progress.
    async fn fetch_fallback(
        &self,
        request: &DownloadRequest,
        sink: &dyn ProgressSink,
    ) -> Result<(), FetchError> {
        sink.log(
            LogLevel::Info,
            "using fallback download method (no resume support)",
        );

        let response = self
            .client
            .get(&request.url)
            .headers(base_headers(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { status });
        }

        let mut file = File::create(&request.dest).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let bytes = chunk?;
            file.write_all(&bytes).await?;
        }
        file.flush().await?;

        sink.log(LogLevel::Info, "download complete (fallback mode)");
        Ok(())
    }
}

impl Default for Downloader {
    fn default() -> Self {
        Self::new()
    }
}

/// Bytes already on disk at the destination; 0 if the file does not exist.
/// Evaluated exactly once per fetch, before the loop starts.
async fn resume_offset(request: &DownloadRequest) -> u64 {
    match tokio::fs::metadata(&request.dest).await {
        Ok(metadata) => metadata.len(),
        Err(_) => 0,
    }
}

async fn open_destination(request: &DownloadRequest, downloaded: u64) -> Result<File, FetchError> {
    let file = if downloaded > 0 {
        OpenOptions::new().append(true).open(&request.dest).await?
    } else {
        File::create(&request.dest).await?
    };
    Ok(file)
}

/// The request's header table plus its cookies as a single `Cookie` header.
/// Names or values the HTTP layer rejects are skipped.
fn base_headers(request: &DownloadRequest) -> HeaderMap {
    let mut map = HeaderMap::new();

    for (name, value) in &request.headers {
        let name = match HeaderName::from_bytes(name.as_bytes()) {
            Ok(name) => name,
            Err(_) => {
                debug!(header = %name, "skipping invalid header name");
                continue;
            }
        };
        match HeaderValue::from_str(value) {
            Ok(value) => {
                map.insert(name, value);
            }
            Err(_) => debug!(header = %name, "skipping invalid header value"),
        }
    }

    if let Some(cookie) = AuthProfile::cookie_header(&request.cookies) {
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            map.insert(COOKIE, value);
        }
    }

    map
}

/// Total length from a `Content-Range` value, format `bytes start-end/total`.
fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse::<u64>().ok()
}
