//! Per-frame pose landmark extraction over the raw video.

use rowio_core::{DecodeOptions, OperationControls, Result, RowioError, VideoCodec};
use rowio_pose::{LandmarkTable, PoseDetector, Skeleton};
use std::path::Path;
use tracing::{debug, info};

use super::{Stage, StageKind};
use crate::session::Session;

pub(crate) struct ExtractStage<'a> {
    pub codec: &'a dyn VideoCodec,
    pub detector: &'a mut dyn PoseDetector,
    pub skeleton: &'a Skeleton,
}

impl Stage for ExtractStage<'_> {
    type Output = LandmarkTable;

    fn kind(&self) -> StageKind {
        StageKind::ExtractLandmarks
    }

    fn check_inputs(&self, session: &Session) -> Result<()> {
        require_transcoded(session)
    }

    fn produce(
        &mut self,
        session: &Session,
        staging: &Path,
        controls: &OperationControls,
    ) -> Result<LandmarkTable> {
        let total = session.video_metadata().map(|m| m.total_frames);
        let timeline = self
            .codec
            .open(&session.files().raw_video, &DecodeOptions::default())?;
        let mut reporter = controls.reporter(StageKind::ExtractLandmarks.name(), total);
        reporter.start();

        let mut table = LandmarkTable::new();
        let mut frames = 0u64;
        for item in timeline {
            controls.cancel.check()?;
            let timed = item?;
            frames += 1;

            let (width, height) = timed.frame.dimensions();
            match self.detector.detect(&timed.frame)? {
                Some(pose) => {
                    let landmarks = self.skeleton.select(&pose, width, height);
                    if !landmarks.is_empty() {
                        table.insert(frames, landmarks);
                    }
                }
                None => debug!(frame = frames, "no pose detected"),
            }
            reporter.advance(1);
        }
        controls.cancel.check()?;

        table.save(staging)?;
        reporter.complete();
        info!(
            session = %session.title(),
            frames,
            detected = table.len(),
            "landmarks extracted"
        );
        Ok(table)
    }
}

/// The raw video and its metadata must both be present.
pub(super) fn require_transcoded(session: &Session) -> Result<()> {
    if !session.files().raw_video.is_file() {
        return Err(RowioError::Validation(format!(
            "session {} has no raw video; transcode first",
            session.title()
        )));
    }
    if session.video_metadata().is_none() {
        return Err(RowioError::Validation(format!(
            "session {} has no video metadata; transcode first",
            session.title()
        )));
    }
    Ok(())
}
