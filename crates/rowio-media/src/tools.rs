//! Locating the FFmpeg command-line tools.

use rowio_core::{Result, RowioError};
use std::path::{Path, PathBuf};

/// Environment variable overriding the `ffmpeg` binary.
pub const FFMPEG_ENV: &str = "ROWIO_FFMPEG";
/// Environment variable overriding the `ffprobe` binary.
pub const FFPROBE_ENV: &str = "ROWIO_FFPROBE";

/// Paths to the `ffmpeg` and `ffprobe` executables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfmpegTools {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl FfmpegTools {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Resolve both tools from the override variables, then `PATH`.
    pub fn discover() -> Result<Self> {
        let tools = Self {
            ffmpeg: locate(FFMPEG_ENV, "ffmpeg")?,
            ffprobe: locate(FFPROBE_ENV, "ffprobe")?,
        };
        tracing::debug!(
            ffmpeg = %tools.ffmpeg.display(),
            ffprobe = %tools.ffprobe.display(),
            "located FFmpeg tools"
        );
        Ok(tools)
    }

    pub fn ffmpeg(&self) -> &Path {
        &self.ffmpeg
    }

    pub fn ffprobe(&self) -> &Path {
        &self.ffprobe
    }
}

fn locate(env_var: &str, binary: &str) -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(env_var).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    which::which(binary)
        .map_err(|e| RowioError::NotFound(format!("{binary} not found on PATH ({e}); set {env_var}")))
}
