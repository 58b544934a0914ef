//! Frame decoding by piping FFmpeg rawvideo output.
//!
//! Two children run side by side: `ffmpeg` streams packed RGB24 frames on
//! stdout and `ffprobe` streams one `best_effort_timestamp_time` per frame.
//! The two are zipped in order. Both children are killed and reaped when the
//! timeline is dropped.

use rowio_core::{DecodeOptions, FrameBuffer, FrameTimeline, Result, RowioError, TimedFrame};
use std::io::{BufRead, BufReader, Lines, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use tracing::{debug, warn};

use crate::probe::probe_video;
use crate::tools::FfmpegTools;

/// A running FFmpeg decode pass.
pub struct FfmpegTimeline {
    frames: Child,
    frame_out: ChildStdout,
    timestamps: Child,
    timestamp_lines: Lines<BufReader<ChildStdout>>,
    width: u32,
    height: u32,
    frame_bytes: usize,
    fps: f64,
    count_hint: Option<u64>,
    decoded: u64,
    last_pts: Option<f64>,
    finished: bool,
}

impl FfmpegTimeline {
    /// Probe `path` and start decoding it.
    pub fn open(tools: &FfmpegTools, path: &Path, options: &DecodeOptions) -> Result<Self> {
        let meta = probe_video(tools, path)?;
        let (width, height) = options.target_size.unwrap_or((meta.width, meta.height));
        if width == 0 || height == 0 {
            return Err(RowioError::Validation(format!(
                "target size {width}x{height} must be positive"
            )));
        }

        let mut frames = Command::new(tools.ffmpeg())
            .args(frame_args(path, options))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| RowioError::Decode(format!("failed to spawn ffmpeg: {e}")))?;

        let mut timestamps = match Command::new(tools.ffprobe())
            .args(timestamp_args(path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                reap(&mut frames);
                return Err(RowioError::Decode(format!("failed to spawn ffprobe: {e}")));
            }
        };

        let (Some(frame_out), Some(ts_out)) = (frames.stdout.take(), timestamps.stdout.take())
        else {
            reap(&mut frames);
            reap(&mut timestamps);
            return Err(RowioError::Decode("decoder pipes unavailable".into()));
        };

        debug!(
            path = %path.display(),
            width,
            height,
            fps = meta.fps,
            frames = meta.total_frames,
            "decoding with ffmpeg"
        );

        Ok(Self {
            frames,
            frame_out,
            timestamps,
            timestamp_lines: BufReader::new(ts_out).lines(),
            width,
            height,
            frame_bytes: FrameBuffer::byte_len(width, height),
            fps: meta.fps,
            count_hint: (meta.total_frames > 0).then_some(meta.total_frames),
            decoded: 0,
            last_pts: None,
            finished: false,
        })
    }

    fn read_frame(&mut self) -> Result<Option<Vec<u8>>> {
        let mut buf = vec![0u8; self.frame_bytes];
        let mut filled = 0;
        while filled < buf.len() {
            match self.frame_out.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(RowioError::Decode(format!("reading frame: {e}"))),
            }
        }
        match filled {
            0 => Ok(None),
            n if n == buf.len() => Ok(Some(buf)),
            n => Err(RowioError::Decode(format!(
                "truncated frame {}: {n} of {} bytes",
                self.decoded + 1,
                self.frame_bytes
            ))),
        }
    }

    /// Next timestamp from ffprobe, or an estimate when it has none.
    fn next_pts(&mut self) -> f64 {
        let parsed = loop {
            match self.timestamp_lines.next() {
                Some(Ok(line)) => {
                    let field = line.trim().trim_end_matches(',');
                    if field.is_empty() {
                        continue;
                    }
                    break field.parse::<f64>().ok();
                }
                _ => break None,
            }
        };
        match (parsed, self.last_pts) {
            (Some(pts), _) => pts,
            (None, Some(last)) => last + 1.0 / self.fps,
            (None, None) => 0.0,
        }
    }

    /// Called once stdout hits EOF: surface a failed ffmpeg exit.
    fn check_exit(&mut self) -> Result<()> {
        let status = self
            .frames
            .wait()
            .map_err(|e| RowioError::Decode(format!("waiting for ffmpeg: {e}")))?;
        if !status.success() {
            return Err(RowioError::Decode(format!("ffmpeg exited with {status}")));
        }
        if self.decoded == 0 {
            warn!("ffmpeg produced no frames");
        }
        Ok(())
    }
}

impl Iterator for FfmpegTimeline {
    type Item = Result<TimedFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let bytes = match self.read_frame() {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                self.finished = true;
                return self.check_exit().err().map(Err);
            }
            Err(e) => {
                self.finished = true;
                return Some(Err(e));
            }
        };

        let pts = self.next_pts();
        self.last_pts = Some(pts);
        self.decoded += 1;
        Some(FrameBuffer::from_rgb(self.width, self.height, bytes).map(|f| TimedFrame::new(f, pts)))
    }
}

impl FrameTimeline for FfmpegTimeline {
    fn frame_count_hint(&self) -> Option<u64> {
        self.count_hint
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Drop for FfmpegTimeline {
    fn drop(&mut self) {
        reap(&mut self.frames);
        reap(&mut self.timestamps);
    }
}

fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Arguments for the rawvideo frame stream.
pub fn frame_args(path: &Path, options: &DecodeOptions) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-v".into(),
        "error".into(),
        "-nostdin".into(),
        "-i".into(),
        path.to_string_lossy().into_owned(),
        "-map".into(),
        "0:v:0".into(),
        "-fps_mode".into(),
        "passthrough".into(),
    ];
    if let Some((w, h)) = options.target_size {
        args.extend_from_slice(&[
            "-vf".into(),
            format!("scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h}"),
        ]);
    }
    args.extend_from_slice(&[
        "-f".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        "rgb24".into(),
        "pipe:1".into(),
    ]);
    args
}

/// Arguments for the per-frame timestamp stream.
pub fn timestamp_args(path: &Path) -> Vec<String> {
    vec![
        "-v".into(),
        "error".into(),
        "-select_streams".into(),
        "v:0".into(),
        "-show_entries".into(),
        "frame=best_effort_timestamp_time".into(),
        "-of".into(),
        "csv=p=0".into(),
        path.to_string_lossy().into_owned(),
    ]
}
