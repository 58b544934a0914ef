//! The session handle passed to every operation.

use rowio_core::{Result, RowioError, VideoMetadata};
use rowio_pose::DetectorPreferences;
use rowio_render::AnnotationPreferences;
use std::path::Path;
use tracing::{info, warn};

use crate::config::{SessionConfig, SessionRecord};
use crate::files::SessionFiles;
use crate::state::SessionState;

/// One source video's processing lifecycle and its on-disk artifacts.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    record: SessionRecord,
    state: SessionState,
}

impl Session {
    pub(crate) fn new(record: SessionRecord, state: SessionState) -> Self {
        Self { record, state }
    }

    pub fn title(&self) -> &str {
        &self.record.title
    }

    pub fn directory(&self) -> &Path {
        &self.record.directory
    }

    pub fn source(&self) -> &Path {
        &self.record.original_video_path
    }

    pub fn files(&self) -> &SessionFiles {
        &self.record.files
    }

    pub fn video_metadata(&self) -> Option<&VideoMetadata> {
        self.record.video_metadata.as_ref()
    }

    pub fn detector_preferences(&self) -> &DetectorPreferences {
        &self.record.mediapipe_preferences
    }

    pub fn annotation_preferences(&self) -> &AnnotationPreferences {
        &self.record.annotation_preferences
    }

    pub fn record(&self) -> &SessionRecord {
        &self.record
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Move to `next`, rejecting moves the state machine does not allow.
    pub fn transition(&mut self, next: SessionState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(RowioError::Internal(format!(
                "session {}: illegal transition {} -> {}",
                self.record.title, self.state, next
            )));
        }
        info!(session = %self.record.title, from = %self.state, to = %next, "session state changed");
        self.state = next;
        Ok(())
    }

    /// Record a stage failure as `Cancelled` or `Error`.
    pub(crate) fn settle_failure(&mut self, error: &RowioError) {
        let next = if error.is_cancelled() {
            SessionState::Cancelled
        } else {
            SessionState::Error
        };
        if self.state == next {
            return;
        }
        if let Err(e) = self.transition(next) {
            warn!(session = %self.record.title, error = %e, "could not record failure state");
        }
    }

    pub(crate) fn set_video_metadata(&mut self, metadata: Option<VideoMetadata>) {
        self.record.video_metadata = metadata;
    }

    /// Persist the config file.
    pub fn save(&self) -> Result<()> {
        SessionConfig::new(self.record.clone()).save(&self.record.files.session_config)
    }
}
