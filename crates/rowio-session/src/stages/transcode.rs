//! Source video to constant-frame-rate raw video.

use rowio_core::{
    CfrResampler, DecodeOptions, EncodeSettings, FrameBuffer, FrameRate, FrameTimeline,
    NormalizedTimeline, OperationControls, Result, RowioError, VideoCodec, VideoMetadata,
};
use std::path::Path;
use tracing::debug;

use super::{Stage, StageKind};
use crate::session::Session;

pub(crate) struct TranscodeStage<'a> {
    pub codec: &'a dyn VideoCodec,
    pub frame_rate: FrameRate,
    pub width: u32,
    pub height: u32,
}

impl Stage for TranscodeStage<'_> {
    type Output = VideoMetadata;

    fn kind(&self) -> StageKind {
        StageKind::Transcode
    }

    fn check_inputs(&self, session: &Session) -> Result<()> {
        if !session.source().is_file() {
            return Err(RowioError::Validation(format!(
                "source video {} does not exist",
                session.source().display()
            )));
        }
        Ok(())
    }

    fn produce(
        &mut self,
        session: &Session,
        staging: &Path,
        controls: &OperationControls,
    ) -> Result<VideoMetadata> {
        let (width, height) = (self.width, self.height);
        let options = DecodeOptions::with_target_size(width, height);
        let timeline = NormalizedTimeline::new(self.codec.open(session.source(), &options)?);

        let mut reporter = controls.reporter(StageKind::Transcode.name(), timeline.frame_count_hint());
        reporter.start();

        let settings = EncodeSettings::new(width, height, self.frame_rate);
        let mut writer = self.codec.create(staging, &settings)?;
        let mut resampler = CfrResampler::<FrameBuffer>::new(self.frame_rate)?;

        for item in timeline {
            controls.cancel.check()?;
            let timed = item?;
            let frame = if timed.frame.dimensions() == (width, height) {
                timed.frame
            } else {
                timed.frame.resize_cover(width, height)
            };
            resampler.push(frame, timed.pts, |_, f| writer.write_frame(f))?;
            reporter.advance(1);
        }
        controls.cancel.check()?;

        let note = resampler.finish(|_, f| writer.write_frame(f))?;
        if note.is_empty() {
            return Err(RowioError::Decode(format!(
                "no frames in {}",
                session.source().display()
            )));
        }
        let stats = resampler.stats();
        let frames = writer.finish()?;
        debug!(
            sources = stats.sources,
            emitted = stats.emitted,
            duplicated = stats.duplicated,
            dropped = stats.dropped,
            "resampled to constant frame rate"
        );
        reporter.complete();

        Ok(VideoMetadata {
            fps: self.frame_rate.to_fps_f64(),
            total_frames: frames,
            width,
            height,
        })
    }
}
