//! Session lifecycle orchestration.

use rowio_core::{OperationControls, Result, RowioError, VideoCodec};
use rowio_pose::{PoseDetector, Skeleton};
use rowio_render::{FrameAnnotator, Painter};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{SessionConfig, SessionRecord};
use crate::files::{SessionFiles, SESSION_CONFIG_FILE};
use crate::session::Session;
use crate::settings::PipelineSettings;
use crate::stages::{run_stage, AnnotateStage, ExtractStage, TranscodeStage};
use crate::state::SessionState;
use crate::title::validate_title;

/// Creates, runs, loads and deletes sessions.
///
/// Holds no session state of its own; every operation works on the
/// [`Session`] handle it is given.
pub struct SessionManager {
    settings: PipelineSettings,
    codec: Arc<dyn VideoCodec>,
    painter: Arc<dyn Painter>,
    skeleton: Skeleton,
}

impl SessionManager {
    pub fn new(
        settings: PipelineSettings,
        codec: Arc<dyn VideoCodec>,
        painter: Arc<dyn Painter>,
    ) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            codec,
            painter,
            skeleton: Skeleton::rower(),
        })
    }

    pub fn with_skeleton(mut self, skeleton: Skeleton) -> Self {
        self.skeleton = skeleton;
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn codec(&self) -> &Arc<dyn VideoCodec> {
        &self.codec
    }

    /// Operation controls seeded from the settings.
    pub fn controls(&self) -> OperationControls {
        OperationControls::new().with_progress_step(self.settings.progress_step)
    }

    /// Create the directory and config for a new session.
    pub fn create(&self, title: &str, source: &Path, overwrite: bool) -> Result<Session> {
        validate_title(title)?;
        self.settings.annotation.validate()?;
        if !source.is_file() {
            return Err(RowioError::Validation(format!(
                "source video {} does not exist",
                source.display()
            )));
        }

        let original_video_path = source.canonicalize()?;

        let directory = self.settings.session_dir(title);
        if directory.exists() {
            if !overwrite {
                return Err(RowioError::AlreadyExists(format!(
                    "session {title} already exists at {}",
                    directory.display()
                )));
            }
            let files = match self.load(&directory) {
                Ok(existing) => existing.files().clone(),
                Err(e) => {
                    warn!(session = %title, error = %e, "existing session unloadable; checking files directly");
                    SessionFiles::in_dir(&directory)
                }
            };
            remove_session_dir(&directory, &files)?;
        }

        fs::create_dir_all(&directory)?;
        let record = SessionRecord {
            title: title.to_string(),
            original_video_path,
            files: SessionFiles::in_dir(&directory),
            directory,
            video_metadata: None,
            mediapipe_preferences: self.settings.detector,
            annotation_preferences: self.settings.annotation,
        };
        let mut session = Session::new(record, SessionState::New);
        session.transition(SessionState::DirectoryCreated)?;
        if let Err(e) = session.save() {
            let _ = remove_session_dir(session.directory(), session.files());
            return Err(e);
        }
        info!(session = %title, directory = %session.directory().display(), "session created");
        Ok(session)
    }

    /// Produce the constant-frame-rate raw video.
    pub fn transcode(&self, session: &mut Session, controls: &OperationControls) -> Result<()> {
        let mut stage = TranscodeStage {
            codec: self.codec.as_ref(),
            frame_rate: self.settings.target_fps,
            width: self.settings.target_width,
            height: self.settings.target_height,
        };
        let metadata = run_stage(&mut stage, session, controls)?;
        session.set_video_metadata(Some(metadata));
        session.save()
    }

    /// Detect landmarks on every raw-video frame.
    pub fn extract_landmarks(
        &self,
        session: &mut Session,
        detector: &mut dyn PoseDetector,
        controls: &OperationControls,
    ) -> Result<()> {
        let mut stage = ExtractStage {
            codec: self.codec.as_ref(),
            detector,
            skeleton: &self.skeleton,
        };
        run_stage(&mut stage, session, controls).map(|_| ())
    }

    /// Render the annotated video.
    pub fn annotate(&self, session: &mut Session, controls: &OperationControls) -> Result<()> {
        let annotator = FrameAnnotator::new(
            self.skeleton.clone(),
            *session.annotation_preferences(),
            Arc::clone(&self.painter),
        )?;
        let mut stage = AnnotateStage {
            codec: self.codec.as_ref(),
            annotator: &annotator,
        };
        run_stage(&mut stage, session, controls)?;
        session.transition(SessionState::Complete)
    }

    /// Open the session stored in `directory`.
    ///
    /// The state is derived from the artifacts present.
    pub fn load(&self, directory: &Path) -> Result<Session> {
        let config = SessionConfig::load(&directory.join(SESSION_CONFIG_FILE))?;
        let mut record = config.session;
        record.reanchor(directory);

        let files = &record.files;
        let state = if files.annotated_video.is_file() {
            SessionState::Complete
        } else if files.landmark_data.is_file() {
            SessionState::LandmarksExtracted
        } else if files.raw_video.is_file() && record.video_metadata.is_some() {
            SessionState::Transcoded
        } else {
            SessionState::DirectoryCreated
        };
        info!(session = %record.title, state = %state, "session loaded");
        Ok(Session::new(record, state))
    }

    /// Open the session named `title` under the sessions root.
    pub fn open(&self, title: &str) -> Result<Session> {
        validate_title(title)?;
        self.load(&self.settings.session_dir(title))
    }

    /// Remove the session directory if it holds only session files.
    pub fn delete(&self, session: &Session) -> Result<()> {
        remove_session_dir(session.directory(), session.files())
    }
}

/// Delete `directory` after checking every entry against the manifest.
fn remove_session_dir(directory: &Path, files: &SessionFiles) -> Result<()> {
    let entries = fs::read_dir(directory).map_err(|e| {
        RowioError::NotFound(format!("session directory {}: {e}", directory.display()))
    })?;

    let mut unexpected = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        if entry.file_type()?.is_dir() || !files.is_managed(&name) {
            unexpected.push(name.to_string_lossy().into_owned());
        }
    }
    if !unexpected.is_empty() {
        unexpected.sort();
        return Err(RowioError::Integrity(format!(
            "refusing to delete {}: unexpected entries {}",
            directory.display(),
            unexpected.join(", ")
        )));
    }

    fs::remove_dir_all(directory)?;
    info!(directory = %directory.display(), "session directory deleted");
    Ok(())
}
