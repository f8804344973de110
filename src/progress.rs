use std::fmt;
use std::sync::Mutex;

use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Download,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Download => write!(f, "download"),
        }
    }
}

/// Emitted once per successfully written chunk, in byte order.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub current: u64,
    pub total: u64,
    pub message: String,
}

impl ProgressEvent {
    pub fn download(current: u64, total: u64, message: String) -> Self {
        Self {
            stage: Stage::Download,
            current,
            total,
            message,
        }
    }

    pub fn percent(&self) -> f64 {
        if self.total > 0 {
            self.current as f64 / self.total as f64 * 100.0
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// Consumer side of the fetch loop.
///
/// The downloader only ever talks to one of these; whether events end up on
/// a terminal, in a channel to a UI thread or nowhere at all is the
/// implementor's business. Emission is synchronous and ordered relative to
/// the bytes it describes.
pub trait ProgressSink: Send + Sync {
    /// Byte-level progress, once per written chunk.
    fn progress(&self, event: &ProgressEvent);

    /// Free-form log line with severity.
    fn log(&self, level: LogLevel, message: &str);

    /// Terminal notification; exactly one per download call.
    fn finished(&self, success: bool, message: &str);
}

/// Default sink: an indicatif bar on stderr plus `tracing` log lines.
pub struct ConsoleSink {
    bar: Mutex<Option<ProgressBar>>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ConsoleSink {
    fn progress(&self, event: &ProgressEvent) {
        let mut guard = self.bar.lock().unwrap();
        let bar = guard.get_or_insert_with(|| {
            let bar = ProgressBar::new(event.total);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes:>12}/{total_bytes:<12} {bytes_per_sec:>12} {eta:>4} {msg}")
                    .unwrap()
                    .progress_chars("=>-"),
            );
            bar
        });
        bar.set_position(event.current);
    }

    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => debug!("{}", message),
            LogLevel::Info => info!("{}", message),
            LogLevel::Warning => warn!("{}", message),
            LogLevel::Error => error!("{}", message),
        }
    }

    fn finished(&self, success: bool, message: &str) {
        let guard = self.bar.lock().unwrap();
        if let Some(bar) = guard.as_ref() {
            if success {
                bar.finish_with_message(format!("{} ({})", message, HumanBytes(bar.position())));
            } else {
                bar.abandon();
            }
        }
        if success {
            info!("{}", message);
        } else {
            error!("{}", message);
        }
    }
}

/// Sink that swallows everything. For embedding hosts that poll state
/// themselves, and for tests.
#[derive(Debug, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn progress(&self, _event: &ProgressEvent) {}

    fn log(&self, _level: LogLevel, _message: &str) {}

    fn finished(&self, _success: bool, _message: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_is_zero_for_unknown_total() {
        let event = ProgressEvent::download(512, 0, String::new());
        assert_eq!(event.percent(), 0.0);
    }

    #[test]
    fn percent_tracks_current_over_total() {
        let event = ProgressEvent::download(2_097_152, 8_388_608, String::new());
        assert!((event.percent() - 25.0).abs() < f64::EPSILON);
    }
}
