//! Pipeline-wide settings.

use rowio_core::{FrameRate, Result, RowioError, DEFAULT_PROGRESS_STEP};
use rowio_pose::DetectorPreferences;
use rowio_render::AnnotationPreferences;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const SESSIONS_DIR_ENV: &str = "ROWIO_SESSIONS_DIR";
pub const TARGET_FPS_ENV: &str = "ROWIO_TARGET_FPS";
pub const TARGET_WIDTH_ENV: &str = "ROWIO_TARGET_WIDTH";
pub const TARGET_HEIGHT_ENV: &str = "ROWIO_TARGET_HEIGHT";

/// Where sessions live and what the stages produce.
///
/// Missing keys in a settings file take their default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub sessions_root: PathBuf,
    pub target_fps: FrameRate,
    pub target_width: u32,
    pub target_height: u32,
    /// Minimum whole-percent advance between progress reports.
    pub progress_step: f64,
    /// Idle interval after which event streams yield a keep-alive.
    pub keepalive_secs: u64,
    pub detector: DetectorPreferences,
    pub annotation: AnnotationPreferences,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            sessions_root: Self::default_sessions_root(),
            target_fps: FrameRate::FPS_30,
            target_width: 1920,
            target_height: 1080,
            progress_step: DEFAULT_PROGRESS_STEP,
            keepalive_secs: 15,
            detector: DetectorPreferences::default(),
            annotation: AnnotationPreferences::default(),
        }
    }
}

impl PipelineSettings {
    pub fn default_sessions_root() -> PathBuf {
        dirs::data_local_dir()
            .map(|dir| dir.join("rowio").join("sessions"))
            .unwrap_or_else(|| PathBuf::from("sessions"))
    }

    /// Read a JSON settings file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            RowioError::NotFound(format!("settings file {}: {e}", path.display()))
        })?;
        serde_json::from_str(&json).map_err(|e| {
            RowioError::Validation(format!("settings file {}: {e}", path.display()))
        })
    }

    /// Override fields from `ROWIO_*` environment variables.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Override fields from any key lookup using the environment variable names.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(SESSIONS_DIR_ENV) {
            debug!(sessions_root = %dir, "sessions root overridden");
            self.sessions_root = PathBuf::from(dir);
        }
        if let Some(fps) = lookup(TARGET_FPS_ENV) {
            let fps: f64 = parse(TARGET_FPS_ENV, &fps)?;
            self.target_fps = FrameRate::from_fps_f64(fps)?;
        }
        if let Some(width) = lookup(TARGET_WIDTH_ENV) {
            self.target_width = parse(TARGET_WIDTH_ENV, &width)?;
        }
        if let Some(height) = lookup(TARGET_HEIGHT_ENV) {
            self.target_height = parse(TARGET_HEIGHT_ENV, &height)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.target_fps.validate()?;
        if self.target_width == 0 || self.target_height == 0 {
            return Err(RowioError::Validation(format!(
                "target size must be non-zero, got {}x{}",
                self.target_width, self.target_height
            )));
        }
        if !(self.progress_step > 0.0 && self.progress_step <= 100.0) {
            return Err(RowioError::Validation(format!(
                "progress_step must be within (0, 100], got {}",
                self.progress_step
            )));
        }
        if self.keepalive_secs == 0 {
            return Err(RowioError::Validation("keepalive_secs must be positive".into()));
        }
        self.annotation.validate()
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }

    /// Directory a session with `title` lives in.
    pub fn session_dir(&self, title: &str) -> PathBuf {
        self.sessions_root.join(title)
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| RowioError::Validation(format!("{key}: cannot parse {value:?}")))
}
