//! Encoding fixed-rate RGB frames by piping them into FFmpeg.

use rowio_core::{EncodeSettings, FrameBuffer, FrameWriter, Result, RowioError};
use serde::{Deserialize, Serialize};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use tracing::debug;

use crate::tools::FfmpegTools;

// ── Encoder configuration ───────────────────────────────────────

/// x264-style encoder options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// FFmpeg encoder name.
    pub codec: String,
    pub preset: String,
    /// Constant rate factor (0-51, lower = better).
    pub crf: u8,
    pub pixel_format: String,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            codec: "libx264".into(),
            preset: "fast".into(),
            crf: 18,
            pixel_format: "yuv420p".into(),
        }
    }
}

impl EncoderConfig {
    /// Build the FFmpeg command arguments for a rawvideo pipe input.
    pub fn ffmpeg_args(&self, settings: &EncodeSettings, output: &Path) -> Vec<String> {
        let rate = settings.frame_rate;
        vec![
            "-y".into(),
            "-v".into(),
            "error".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pixel_format".into(),
            "rgb24".into(),
            "-video_size".into(),
            format!("{}x{}", settings.width, settings.height),
            "-framerate".into(),
            format!("{}/{}", rate.numerator, rate.denominator),
            "-i".into(),
            "pipe:0".into(),
            "-c:v".into(),
            self.codec.clone(),
            "-preset".into(),
            self.preset.clone(),
            "-crf".into(),
            self.crf.to_string(),
            "-pix_fmt".into(),
            self.pixel_format.clone(),
            "-an".into(),
            output.to_string_lossy().into_owned(),
        ]
    }
}

// ── Writer ──────────────────────────────────────────────────────

/// A running FFmpeg encode.
///
/// Dropping the writer before [`FrameWriter::finish`] kills the child.
pub struct FfmpegWriter {
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    settings: EncodeSettings,
    output: PathBuf,
    written: u64,
}

impl FfmpegWriter {
    pub fn spawn(
        tools: &FfmpegTools,
        config: &EncoderConfig,
        output: &Path,
        settings: &EncodeSettings,
    ) -> Result<Self> {
        if settings.width == 0 || settings.height == 0 {
            return Err(RowioError::Validation(format!(
                "encode size {}x{} must be positive",
                settings.width, settings.height
            )));
        }
        settings.frame_rate.validate()?;

        let args = config.ffmpeg_args(settings, output);
        let mut child = Command::new(tools.ffmpeg())
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| RowioError::Encode(format!("failed to spawn ffmpeg: {e}")))?;

        let Some(stdin) = child.stdin.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(RowioError::Encode("failed to open ffmpeg stdin".into()));
        };

        debug!(
            output = %output.display(),
            width = settings.width,
            height = settings.height,
            fps = settings.frame_rate.to_fps_f64(),
            "encoding with ffmpeg"
        );

        Ok(Self {
            child,
            stdin: Some(BufWriter::new(stdin)),
            settings: *settings,
            output: output.to_path_buf(),
            written: 0,
        })
    }
}

impl FrameWriter for FfmpegWriter {
    fn write_frame(&mut self, frame: &FrameBuffer) -> Result<()> {
        if frame.dimensions() != (self.settings.width, self.settings.height) {
            return Err(RowioError::Encode(format!(
                "frame is {}x{}, encoder expects {}x{}",
                frame.width, frame.height, self.settings.width, self.settings.height
            )));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| RowioError::Encode("encoder already closed".into()))?;
        stdin
            .write_all(frame.as_bytes())
            .map_err(|e| RowioError::Encode(format!("failed to write frame: {e}")))?;
        self.written += 1;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.written
    }

    fn finish(mut self: Box<Self>) -> Result<u64> {
        // Flush and close stdin to signal end-of-stream
        if let Some(mut stdin) = self.stdin.take() {
            stdin
                .flush()
                .map_err(|e| RowioError::Encode(format!("failed to flush frames: {e}")))?;
        }

        let status = self
            .child
            .wait()
            .map_err(|e| RowioError::Encode(format!("failed to wait for ffmpeg: {e}")))?;
        if !status.success() {
            return Err(RowioError::Encode(format!(
                "ffmpeg exited with {status} while writing {}",
                self.output.display()
            )));
        }
        Ok(self.written)
    }
}

impl Drop for FfmpegWriter {
    fn drop(&mut self) {
        if self.stdin.take().is_some() {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}
