pub mod cli;
pub mod commands;
pub mod downloader;
pub mod error;
pub mod profile;
pub mod progress;
pub mod remux;
pub mod state;
pub mod utils;

pub use commands::{run_download, DownloadOptions, DownloadOutcome};
pub use downloader::Downloader;
pub use error::FetchError;
pub use profile::AuthProfile;
pub use progress::{ConsoleSink, NullSink, ProgressEvent, ProgressSink};
pub use state::DownloadRequest;
