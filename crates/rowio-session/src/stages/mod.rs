//! Pipeline stages.
//!
//! Every stage writes its single output under a staging name and renames it
//! into place only after the whole pass succeeded. A failed or cancelled
//! stage leaves nothing behind but the inputs it started from.

mod annotate;
mod extract;
mod transcode;

pub(crate) use annotate::AnnotateStage;
pub(crate) use extract::ExtractStage;
pub(crate) use transcode::TranscodeStage;

use rowio_core::{OperationControls, Result, RowioError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::files::{staging_path, SessionFiles};
use crate::session::Session;
use crate::state::SessionState;

/// The three pipeline stages, in run order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Transcode,
    ExtractLandmarks,
    Annotate,
}

impl StageKind {
    pub const ALL: [StageKind; 3] = [Self::Transcode, Self::ExtractLandmarks, Self::Annotate];

    /// Name used in progress reports and logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::Transcode => "transcode",
            Self::ExtractLandmarks => "extract_landmarks",
            Self::Annotate => "annotate",
        }
    }

    /// The artifact this stage produces.
    pub fn output(self, files: &SessionFiles) -> &Path {
        match self {
            Self::Transcode => &files.raw_video,
            Self::ExtractLandmarks => &files.landmark_data,
            Self::Annotate => &files.annotated_video,
        }
    }

    /// Stages whose outputs are derived from this stage's output.
    pub fn downstream(self) -> &'static [StageKind] {
        match self {
            Self::Transcode => &[Self::ExtractLandmarks, Self::Annotate],
            Self::ExtractLandmarks => &[Self::Annotate],
            Self::Annotate => &[],
        }
    }

    /// State a session is in once this stage succeeded.
    pub fn result_state(self) -> SessionState {
        match self {
            Self::Transcode => SessionState::Transcoded,
            Self::ExtractLandmarks => SessionState::LandmarksExtracted,
            Self::Annotate => SessionState::Annotated,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One cancellable unit of work producing a single session artifact.
pub(crate) trait Stage {
    type Output;

    fn kind(&self) -> StageKind;

    /// Check that the inputs exist. Must not touch the filesystem otherwise.
    fn check_inputs(&self, session: &Session) -> Result<()>;

    /// Write the artifact to `staging`.
    fn produce(
        &mut self,
        session: &Session,
        staging: &Path,
        controls: &OperationControls,
    ) -> Result<Self::Output>;
}

/// Staging file of a running stage. Removed on drop unless committed.
struct StagedOutput {
    staging: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl StagedOutput {
    fn begin(target: &Path) -> Result<Self> {
        let staging = staging_path(target);
        remove_if_present(&staging)?;
        Ok(Self {
            staging,
            target: target.to_path_buf(),
            committed: false,
        })
    }

    fn path(&self) -> &Path {
        &self.staging
    }

    fn commit(mut self) -> Result<()> {
        fs::rename(&self.staging, &self.target)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedOutput {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match remove_if_present(&self.staging) {
            Ok(()) => debug!(path = %self.staging.display(), "staging output removed"),
            Err(e) => warn!(path = %self.staging.display(), error = %e, "failed to remove staging output"),
        }
    }
}

pub(crate) fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

/// Remove the outputs of every stage that consumed `kind`'s previous output.
fn invalidate_downstream(kind: StageKind, session: &Session) -> Result<()> {
    for later in kind.downstream() {
        let path = later.output(session.files());
        if path.exists() {
            info!(session = %session.title(), stage = %later, "removing stale output");
            fs::remove_file(path)?;
        }
    }
    Ok(())
}

/// Run `stage` against `session`.
///
/// Preconditions are checked before anything is written. Once the stage has
/// started, a failure moves the session to `Cancelled` or `Error` and a
/// success moves it to the stage's result state.
pub(crate) fn run_stage<S: Stage>(
    stage: &mut S,
    session: &mut Session,
    controls: &OperationControls,
) -> Result<S::Output> {
    let kind = stage.kind();
    let target = kind.output(session.files()).to_path_buf();

    if !session.state().can_transition_to(kind.result_state()) {
        return Err(RowioError::Validation(format!(
            "session {} is {}; cannot run {kind}",
            session.title(),
            session.state()
        )));
    }
    stage.check_inputs(session)?;
    if target.exists() && !controls.overwrite {
        return Err(RowioError::AlreadyExists(format!(
            "{} already exists",
            target.display()
        )));
    }
    if let Err(e) = controls.cancel.check() {
        info!(session = %session.title(), stage = %kind, "stage cancelled before start");
        session.settle_failure(&e);
        return Err(e);
    }

    if target.exists() {
        info!(session = %session.title(), stage = %kind, "replacing existing output");
        fs::remove_file(&target)?;
    }

    let started = Instant::now();
    info!(session = %session.title(), stage = %kind, "stage started");
    let staged = StagedOutput::begin(&target)?;
    let result = stage
        .produce(session, staged.path(), controls)
        .and_then(|output| staged.commit().map(|()| output))
        .and_then(|output| invalidate_downstream(kind, session).map(|()| output));

    match result {
        Ok(output) => {
            info!(
                session = %session.title(),
                stage = %kind,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "stage finished"
            );
            session.transition(kind.result_state())?;
            Ok(output)
        }
        Err(e) => {
            if e.is_cancelled() {
                info!(session = %session.title(), stage = %kind, "stage cancelled");
            } else {
                warn!(session = %session.title(), stage = %kind, error = %e, "stage failed");
            }
            session.settle_failure(&e);
            Err(e)
        }
    }
}
