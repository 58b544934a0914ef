//! Pose detectors.
//!
//! The detection model runs out of process. [`ProcessDetector`] speaks a
//! line-oriented protocol with a long-lived child:
//!
//! ```text
//! stage -> child : {"width":W,"height":H}\n  followed by W*H*3 RGB bytes
//! child -> stage : null | [{"x":..,"y":..,"visibility":..}, ...] | {"name": {...}, ...}
//! ```
//!
//! Coordinates in replies are normalized to the frame size.

use rowio_core::{FrameBuffer, Result, RowioError};
use serde::Serialize;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tracing::{debug, info};

use crate::landmarks::DetectedPose;
use crate::preferences::DetectorPreferences;

/// Something that finds zero or one pose per frame.
///
/// A single call may block; cancellation is only observed between frames.
pub trait PoseDetector: Send {
    fn detect(&mut self, frame: &FrameBuffer) -> Result<Option<DetectedPose>>;
}

impl<F> PoseDetector for F
where
    F: FnMut(&FrameBuffer) -> Result<Option<DetectedPose>> + Send,
{
    fn detect(&mut self, frame: &FrameBuffer) -> Result<Option<DetectedPose>> {
        self(frame)
    }
}

#[derive(Serialize)]
struct FrameHeader {
    width: u32,
    height: u32,
}

/// Program and arguments used to launch a detector process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl DetectorCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Split a shell-like command line on whitespace.
    pub fn parse(command_line: &str) -> Result<Self> {
        let mut parts = command_line.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| RowioError::Validation("detector command is empty".into()))?;
        Ok(Self {
            program: program.into(),
            args: parts.map(str::to_string).collect(),
        })
    }
}

/// Detector running as a child process.
pub struct ProcessDetector {
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    stdout: BufReader<ChildStdout>,
    frames: u64,
}

impl ProcessDetector {
    /// Launch the detector with `preferences` appended to its arguments.
    pub fn spawn(command: &DetectorCommand, preferences: &DetectorPreferences) -> Result<Self> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .args(preferences.to_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                RowioError::Detector(format!(
                    "failed to spawn {}: {e}",
                    command.program.display()
                ))
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(RowioError::Detector("detector pipes unavailable".into()));
        };

        info!(program = %command.program.display(), "pose detector started");
        Ok(Self {
            child,
            stdin: Some(BufWriter::new(stdin)),
            stdout: BufReader::new(stdout),
            frames: 0,
        })
    }

    fn send(&mut self, frame: &FrameBuffer) -> std::io::Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdin closed"))?;
        let header = FrameHeader {
            width: frame.width,
            height: frame.height,
        };
        serde_json::to_writer(&mut *stdin, &header)?;
        stdin.write_all(b"\n")?;
        stdin.write_all(frame.as_bytes())?;
        stdin.flush()
    }
}

impl PoseDetector for ProcessDetector {
    fn detect(&mut self, frame: &FrameBuffer) -> Result<Option<DetectedPose>> {
        self.frames += 1;
        self.send(frame).map_err(|e| {
            RowioError::Detector(format!("sending frame {} to detector: {e}", self.frames))
        })?;

        let mut line = String::new();
        let read = self
            .stdout
            .read_line(&mut line)
            .map_err(|e| RowioError::Detector(format!("reading detector reply: {e}")))?;
        if read == 0 {
            return Err(RowioError::Detector(format!(
                "detector exited before answering frame {}",
                self.frames
            )));
        }
        parse_reply(&line)
    }
}

impl Drop for ProcessDetector {
    fn drop(&mut self) {
        // Closing stdin lets a well-behaved detector exit on its own.
        drop(self.stdin.take());
        let _ = self.child.kill();
        let _ = self.child.wait();
        debug!(frames = self.frames, "pose detector stopped");
    }
}

/// Decode one reply line.
pub fn parse_reply(line: &str) -> Result<Option<DetectedPose>> {
    serde_json::from_str(line.trim())
        .map_err(|e| RowioError::Detector(format!("malformed detector reply: {e}")))
}
