//! Progress reporting and per-stage operation controls.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::cancel::CancellationToken;

/// Callback receiving `(stage_name, percent)` with percent in `0..=100`.
pub type ProgressCallback = Arc<dyn Fn(&str, f64) + Send + Sync>;

/// Default minimum advance, in whole percent, between two reports.
pub const DEFAULT_PROGRESS_STEP: f64 = 1.0;

/// Turns unit counts into throttled percentage reports for one stage.
///
/// Reports are best effort: a panicking callback is caught and logged and
/// the stage carries on.
pub struct ProgressReporter {
    stage: String,
    total: Option<u64>,
    completed: u64,
    min_step: f64,
    callback: Option<ProgressCallback>,
    last_percent: Option<u64>,
}

impl ProgressReporter {
    /// `total` of `None` or zero means unknown; only 0 and 100 are reported.
    pub fn new(
        stage: impl Into<String>,
        total: Option<u64>,
        callback: Option<ProgressCallback>,
    ) -> Self {
        Self {
            stage: stage.into(),
            total: total.filter(|t| *t > 0),
            completed: 0,
            min_step: DEFAULT_PROGRESS_STEP,
            callback,
            last_percent: None,
        }
    }

    pub fn with_min_step(mut self, min_step: f64) -> Self {
        self.min_step = if min_step.is_finite() && min_step > 0.0 {
            min_step
        } else {
            DEFAULT_PROGRESS_STEP
        };
        self
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Emit the initial 0%.
    pub fn start(&mut self) {
        if self.last_percent.is_none() {
            self.emit(0.0);
        }
    }

    /// Record `units` more completed units.
    pub fn advance(&mut self, units: u64) {
        self.set_completed(self.completed.saturating_add(units));
    }

    /// Record the absolute number of completed units.
    pub fn set_completed(&mut self, completed: u64) {
        self.completed = completed;
        let Some(total) = self.total else {
            return;
        };
        let percent = (completed as f64 * 100.0 / total as f64).clamp(0.0, 100.0);
        let whole = percent.floor() as u64;
        let due = match self.last_percent {
            None => true,
            Some(last) => whole > last && (whole - last) as f64 >= self.min_step,
        };
        if due {
            self.emit(percent);
        }
    }

    /// Emit 100% unless it was already reported.
    pub fn complete(&mut self) {
        if self.last_percent != Some(100) {
            self.emit(100.0);
        }
    }

    fn emit(&mut self, percent: f64) {
        self.last_percent = Some(percent.floor() as u64);
        let Some(callback) = &self.callback else {
            return;
        };
        let stage = self.stage.as_str();
        if catch_unwind(AssertUnwindSafe(|| callback(stage, percent))).is_err() {
            tracing::warn!(stage, percent, "progress callback panicked; continuing");
        }
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("stage", &self.stage)
            .field("total", &self.total)
            .field("completed", &self.completed)
            .field("last_percent", &self.last_percent)
            .finish()
    }
}

/// Per-invocation settings handed to a stage.
///
/// Build a fresh value for every stage call.
#[derive(Clone)]
pub struct OperationControls {
    /// Replace an existing output instead of failing.
    pub overwrite: bool,
    pub progress: Option<ProgressCallback>,
    pub cancel: CancellationToken,
    pub progress_step: f64,
}

impl OperationControls {
    pub fn new() -> Self {
        Self {
            overwrite: false,
            progress: None,
            cancel: CancellationToken::new(),
            progress_step: DEFAULT_PROGRESS_STEP,
        }
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress_step(mut self, step: f64) -> Self {
        self.progress_step = step;
        self
    }

    /// Reporter for `stage` over `total` units.
    pub fn reporter(&self, stage: &str, total: Option<u64>) -> ProgressReporter {
        ProgressReporter::new(stage, total, self.progress.clone()).with_min_step(self.progress_step)
    }
}

impl Default for OperationControls {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OperationControls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationControls")
            .field("overwrite", &self.overwrite)
            .field("progress", &self.progress.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .field("progress_step", &self.progress_step)
            .finish()
    }
}
