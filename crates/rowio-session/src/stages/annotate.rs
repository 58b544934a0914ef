//! Overlay rendering over the raw video.

use rowio_core::{
    DecodeOptions, EncodeSettings, FrameRate, FrameTimeline, OperationControls, Result,
    RowioError, VideoCodec,
};
use rowio_pose::LandmarkTable;
use rowio_render::FrameAnnotator;
use std::path::Path;
use tracing::{info, warn};

use super::extract::require_transcoded;
use super::{Stage, StageKind};
use crate::session::Session;

pub(crate) struct AnnotateStage<'a> {
    pub codec: &'a dyn VideoCodec,
    pub annotator: &'a FrameAnnotator,
}

impl Stage for AnnotateStage<'_> {
    /// Number of frames written.
    type Output = u64;

    fn kind(&self) -> StageKind {
        StageKind::Annotate
    }

    fn check_inputs(&self, session: &Session) -> Result<()> {
        require_transcoded(session)?;
        if !session.files().landmark_data.is_file() {
            return Err(RowioError::Validation(format!(
                "session {} has no landmark data; extract landmarks first",
                session.title()
            )));
        }
        Ok(())
    }

    fn produce(
        &mut self,
        session: &Session,
        staging: &Path,
        controls: &OperationControls,
    ) -> Result<u64> {
        let metadata = session.video_metadata().copied().ok_or_else(|| {
            RowioError::Internal("video metadata vanished after precondition check".into())
        })?;
        let table = LandmarkTable::load(
            &session.files().landmark_data,
            metadata.width,
            metadata.height,
        )?;

        let timeline = self
            .codec
            .open(&session.files().raw_video, &DecodeOptions::default())?;
        let (width, height) = timeline.dimensions();
        let rate = FrameRate::from_fps_f64(metadata.fps)?;
        let mut writer = self
            .codec
            .create(staging, &EncodeSettings::new(width, height, rate))?;

        let mut reporter = controls.reporter(StageKind::Annotate.name(), Some(metadata.total_frames));
        reporter.start();

        let mut frame_index = 0u64;
        let mut bare = 0u64;
        for item in timeline {
            controls.cancel.check()?;
            let timed = item?;
            frame_index += 1;

            match table.get(frame_index) {
                Some(landmarks) => {
                    let annotated = self.annotator.annotate(&timed.frame, landmarks)?;
                    writer.write_frame(&annotated)?;
                }
                None => {
                    warn!(frame = frame_index, "no landmarks for frame, writing it unannotated");
                    bare += 1;
                    writer.write_frame(&timed.frame)?;
                }
            }
            reporter.advance(1);
        }
        controls.cancel.check()?;

        let written = writer.finish()?;
        reporter.complete();
        info!(
            session = %session.title(),
            frames = written,
            unannotated = bare,
            "annotated video written"
        );
        Ok(written)
    }
}
