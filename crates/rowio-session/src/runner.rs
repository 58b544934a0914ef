//! Background pipeline runs.

use rowio_core::{CancellationToken, ProgressCallback, Result, RowioError};
use rowio_pose::PoseDetector;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{info, warn};

use crate::events::{EventHub, PipelineEvent};
use crate::manager::SessionManager;
use crate::session::Session;
use crate::stages::StageKind;
use crate::state::SessionState;

/// How a background run behaves.
#[derive(Clone, Default)]
pub struct RunOptions {
    /// Re-run stages whose output already exists.
    pub overwrite: bool,
    /// Published to under the session title.
    pub events: Option<EventHub>,
    /// Called in addition to event publishing.
    pub progress: Option<ProgressCallback>,
}

impl fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOptions")
            .field("overwrite", &self.overwrite)
            .field("events", &self.events.is_some())
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Result of a finished run.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub session: Session,
    /// `Complete`, `Cancelled` or `Error`.
    pub state: SessionState,
    /// Set when `state` is `Error`.
    pub error: Option<RowioError>,
}

impl PipelineOutcome {
    pub fn is_complete(&self) -> bool {
        self.state == SessionState::Complete
    }
}

/// Handle to a run on its worker thread.
pub struct PipelineHandle {
    title: String,
    token: CancellationToken,
    thread: JoinHandle<PipelineOutcome>,
}

impl PipelineHandle {
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Ask the running stage to stop at its next frame boundary.
    pub fn cancel(&self) {
        info!(session = %self.title, "pipeline cancellation requested");
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the run to end.
    pub fn join(self) -> Result<PipelineOutcome> {
        self.thread
            .join()
            .map_err(|_| RowioError::Internal(format!("pipeline thread for {} panicked", self.title)))
    }
}

/// Runs transcode, extract and annotate in order on a dedicated thread.
pub struct PipelineRunner;

impl PipelineRunner {
    pub fn spawn(
        manager: Arc<SessionManager>,
        session: Session,
        detector: Box<dyn PoseDetector>,
        options: RunOptions,
    ) -> Result<PipelineHandle> {
        let title = session.title().to_string();
        let token = CancellationToken::new();
        let worker_token = token.clone();

        let thread = thread::Builder::new()
            .name(format!("rowio-pipeline-{title}"))
            .spawn(move || run_pipeline(&manager, session, detector, &options, worker_token))?;

        info!(session = %title, "pipeline started");
        Ok(PipelineHandle {
            title,
            token,
            thread,
        })
    }
}

fn run_pipeline(
    manager: &SessionManager,
    mut session: Session,
    mut detector: Box<dyn PoseDetector>,
    options: &RunOptions,
    token: CancellationToken,
) -> PipelineOutcome {
    let title = session.title().to_string();
    let publish = |event: PipelineEvent| {
        if let Some(hub) = &options.events {
            hub.publish(&title, event);
        }
    };

    let result = run_stages(manager, &mut session, detector.as_mut(), options, &token, &publish);
    drop(detector);

    let (state, error) = match result {
        Ok(()) => (session.state(), None),
        Err(e) => {
            session.settle_failure(&e);
            if e.is_cancelled() {
                (SessionState::Cancelled, None)
            } else {
                (SessionState::Error, Some(e))
            }
        }
    };

    match &error {
        Some(e) => warn!(session = %title, error = %e, "pipeline failed"),
        None => info!(session = %title, state = %state, "pipeline finished"),
    }
    publish(PipelineEvent::Finished {
        state,
        message: error.as_ref().map(ToString::to_string),
    });

    PipelineOutcome {
        session,
        state,
        error,
    }
}

fn run_stages(
    manager: &SessionManager,
    session: &mut Session,
    detector: &mut dyn PoseDetector,
    options: &RunOptions,
    token: &CancellationToken,
    publish: &dyn Fn(PipelineEvent),
) -> Result<()> {
    for kind in StageKind::ALL {
        if !options.overwrite && kind.output(session.files()).exists() {
            info!(session = %session.title(), stage = %kind, "output present, stage skipped");
            continue;
        }

        let forward = options.progress.clone();
        let hub = options.events.clone();
        let title = session.title().to_string();
        let report: ProgressCallback = Arc::new(move |stage: &str, percent: f64| {
            if let Some(hub) = &hub {
                hub.publish(
                    &title,
                    PipelineEvent::Progress {
                        stage: stage.to_string(),
                        percent,
                    },
                );
            }
            if let Some(forward) = &forward {
                forward(stage, percent);
            }
        });
        let controls = manager
            .controls()
            .with_overwrite(options.overwrite)
            .with_cancel(token.clone())
            .with_progress(report);

        match kind {
            StageKind::Transcode => manager.transcode(session, &controls)?,
            StageKind::ExtractLandmarks => manager.extract_landmarks(session, detector, &controls)?,
            StageKind::Annotate => manager.annotate(session, &controls)?,
        }
        publish(PipelineEvent::StateChanged {
            state: session.state(),
        });
    }
    Ok(())
}
