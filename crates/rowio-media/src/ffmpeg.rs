//! [`VideoCodec`] backed by the FFmpeg command-line tools.

use rowio_core::{
    DecodeOptions, EncodeSettings, FrameTimeline, FrameWriter, Result, VideoCodec, VideoMetadata,
};
use std::path::Path;

use crate::decoder::FfmpegTimeline;
use crate::encoder::{EncoderConfig, FfmpegWriter};
use crate::probe::probe_video;
use crate::tools::FfmpegTools;

/// Decodes through `ffmpeg`/`ffprobe` subprocesses and encodes H.264.
#[derive(Debug, Clone)]
pub struct FfmpegCodec {
    tools: FfmpegTools,
    encoder: EncoderConfig,
}

impl FfmpegCodec {
    pub fn new(tools: FfmpegTools) -> Self {
        Self {
            tools,
            encoder: EncoderConfig::default(),
        }
    }

    /// Locate the tools and use the default encoder settings.
    pub fn discover() -> Result<Self> {
        Ok(Self::new(FfmpegTools::discover()?))
    }

    pub fn with_encoder(mut self, encoder: EncoderConfig) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn tools(&self) -> &FfmpegTools {
        &self.tools
    }

    pub fn encoder(&self) -> &EncoderConfig {
        &self.encoder
    }
}

impl VideoCodec for FfmpegCodec {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn probe(&self, path: &Path) -> Result<VideoMetadata> {
        probe_video(&self.tools, path)
    }

    fn open(&self, path: &Path, options: &DecodeOptions) -> Result<Box<dyn FrameTimeline>> {
        Ok(Box::new(FfmpegTimeline::open(&self.tools, path, options)?))
    }

    fn create(&self, path: &Path, settings: &EncodeSettings) -> Result<Box<dyn FrameWriter>> {
        Ok(Box::new(FfmpegWriter::spawn(
            &self.tools,
            &self.encoder,
            path,
            settings,
        )?))
    }
}
