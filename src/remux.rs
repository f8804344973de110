use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tokio::process::Command;

/// Re-containerize a finished MP4 so the moov atom sits at the front and
/// players can seek before the file is fully buffered. Produces a
/// `<stem>_fixed.mp4` sibling and leaves the input untouched.
pub async fn faststart(input: &Path) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "video".to_string());
    let output = input.with_file_name(format!("{}_fixed.mp4", stem));

    let result = Command::new("ffmpeg")
        .arg("-y")
        .arg("-i")
        .arg(input)
        .arg("-c")
        .arg("copy")
        .arg("-movflags")
        .arg("faststart")
        .arg(&output)
        .output()
        .await
        .context("failed to run ffmpeg; is it installed and on PATH?")?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        let tail: Vec<&str> = stderr.lines().rev().take(4).collect();
        bail!("ffmpeg exited with {}: {}", result.status, tail.join(" | "));
    }

    Ok(output)
}
