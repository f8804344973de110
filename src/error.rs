use reqwest::StatusCode;
use thiserror::Error;

/// Failure modes of a single fetch attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("could not determine remote size for {url}")]
    SizeUnknown { url: String },

    #[error("access forbidden (403) for range {range} after {attempts} attempts")]
    Forbidden { range: String, attempts: u32 },

    #[error("unexpected HTTP status {status}")]
    Status { status: StatusCode },

    #[error("download cancelled")]
    Cancelled,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Whether the chunked path should hand off to the single-pass fallback.
    ///
    /// A size probe that comes up empty, a connection/timeout failure or a
    /// local I/O failure all go through the fallback once. An unexpected
    /// status (including an exhausted 403 retry budget) is final, and so is
    /// cancellation.
    pub fn triggers_fallback(&self) -> bool {
        matches!(
            self,
            FetchError::SizeUnknown { .. } | FetchError::Network(_) | FetchError::Io(_)
        )
    }
}
