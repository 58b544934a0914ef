//! Session config persistence with versioning and migration.
//!
//! `session_config.json` is a flat JSON object: the session fields plus a
//! schema `version` and the `app_version` that wrote it.

use rowio_core::{Result, RowioError, VideoMetadata};
use rowio_pose::DetectorPreferences;
use rowio_render::AnnotationPreferences;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::files::{staging_path, SessionFiles};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Everything persisted about a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub title: String,
    pub original_video_path: PathBuf,
    pub directory: PathBuf,
    pub files: SessionFiles,
    pub video_metadata: Option<VideoMetadata>,
    pub mediapipe_preferences: DetectorPreferences,
    pub annotation_preferences: AnnotationPreferences,
}

impl SessionRecord {
    /// Point `directory` and `files` at `directory`, wherever the record was
    /// written from.
    pub fn reanchor(&mut self, directory: &Path) {
        self.directory = directory.to_path_buf();
        self.files = SessionFiles::in_dir(directory);
    }
}

/// Versioned config file wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub version: u32,
    pub app_version: String,
    #[serde(flatten)]
    pub session: SessionRecord,
}

impl SessionConfig {
    pub fn new(session: SessionRecord) -> Self {
        Self {
            version: CURRENT_VERSION,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            session,
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| RowioError::Serialization(format!("Failed to serialize session: {e}")))
    }

    /// Parse, migrating older layouts first.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let raw: serde_json::Value = serde_json::from_slice(data)
            .map_err(|e| RowioError::Serialization(format!("Invalid JSON: {e}")))?;

        let version = raw
            .get("version")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        if version > u64::from(CURRENT_VERSION) {
            return Err(RowioError::Serialization(format!(
                "Session config version {version} is newer than supported version {CURRENT_VERSION}"
            )));
        }

        let migrated = migrate(raw, version as u32)?;
        serde_json::from_value(migrated)
            .map_err(|e| RowioError::Serialization(format!("Failed to parse session: {e}")))
    }

    /// Write through the staging name, then rename into place.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = self.to_json()?;
        let staging = staging_path(path);
        fs::write(&staging, data)?;
        if let Err(e) = fs::rename(&staging, path) {
            let _ = fs::remove_file(&staging);
            return Err(e.into());
        }
        Ok(())
    }

    /// Missing or unreadable files are `NotFound`.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path).map_err(|e| {
            RowioError::NotFound(format!("session config {}: {e}", path.display()))
        })?;
        Self::from_json(&data).map_err(|e| {
            RowioError::NotFound(format!("session config {}: {e}", path.display()))
        })
    }
}

/// Apply sequential migrations from `from_version` to [`CURRENT_VERSION`].
fn migrate(mut data: serde_json::Value, from_version: u32) -> Result<serde_json::Value> {
    let mut version = from_version;

    while version < CURRENT_VERSION {
        match version {
            0 => {
                // v0 is the bare session object.
                let Some(object) = data.as_object_mut() else {
                    return Err(RowioError::Serialization(
                        "session config must be a JSON object".into(),
                    ));
                };
                object.insert("version".into(), 1.into());
                object
                    .entry("app_version")
                    .or_insert_with(|| "0.0.0".into());
                version = 1;
            }
            _ => {
                return Err(RowioError::Serialization(format!(
                    "No migration path from version {version}"
                )));
            }
        }
    }

    Ok(data)
}
