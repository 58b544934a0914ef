//! Video codec seams.
//!
//! Stages decode and encode through these traits; `rowio-media` provides
//! the FFmpeg-backed implementation and a lossless raw container.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::frame::FrameBuffer;
use crate::time::FrameRate;
use crate::timeline::FrameTimeline;

/// Facts about an encoded video recorded after transcoding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub fps: f64,
    pub total_frames: u64,
    pub width: u32,
    pub height: u32,
}

/// Options for opening a decode pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Scale-to-fill and centre-crop every frame to this size.
    pub target_size: Option<(u32, u32)>,
}

impl DecodeOptions {
    pub fn with_target_size(width: u32, height: u32) -> Self {
        Self {
            target_size: Some((width, height)),
        }
    }
}

/// Parameters for an encode pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeSettings {
    pub width: u32,
    pub height: u32,
    pub frame_rate: FrameRate,
}

impl EncodeSettings {
    pub fn new(width: u32, height: u32, frame_rate: FrameRate) -> Self {
        Self {
            width,
            height,
            frame_rate,
        }
    }
}

/// Sink for fixed-rate RGB frames.
///
/// Dropping a writer without calling [`finish`](FrameWriter::finish)
/// abandons the output; the file left behind is incomplete.
pub trait FrameWriter: Send {
    /// Append one frame. Its dimensions must match the encode settings.
    fn write_frame(&mut self, frame: &FrameBuffer) -> Result<()>;

    /// Frames accepted so far.
    fn frames_written(&self) -> u64;

    /// Flush and close the container, returning the frame count.
    fn finish(self: Box<Self>) -> Result<u64>;
}

/// Decode/encode backend.
pub trait VideoCodec: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Read container metadata without decoding frames.
    fn probe(&self, path: &Path) -> Result<VideoMetadata>;

    /// Start a single decode pass. Timestamps are raw; callers normalize.
    fn open(&self, path: &Path, options: &DecodeOptions) -> Result<Box<dyn FrameTimeline>>;

    /// Start writing a new container at `path`, replacing any file there.
    fn create(&self, path: &Path, settings: &EncodeSettings) -> Result<Box<dyn FrameWriter>>;
}
