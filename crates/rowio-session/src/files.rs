//! Session directory layout and the file manifest.

use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

pub const SESSION_CONFIG_FILE: &str = "session_config.json";
pub const RAW_VIDEO_FILE: &str = "raw.mp4";
pub const LANDMARK_DATA_FILE: &str = "landmarks.json";
pub const ANALYSIS_DATA_FILE: &str = "analysis.json";
pub const ANNOTATED_VIDEO_FILE: &str = "annotated.mp4";

/// Marker inserted before the extension of in-progress outputs.
pub const STAGING_MARKER: &str = "partial";

/// Paths of every artifact a session may hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFiles {
    pub raw_video: PathBuf,
    pub landmark_data: PathBuf,
    pub annotated_video: PathBuf,
    pub analysis_data: PathBuf,
    pub session_config: PathBuf,
}

impl SessionFiles {
    /// Standard layout inside `directory`.
    pub fn in_dir(directory: &Path) -> Self {
        Self {
            raw_video: directory.join(RAW_VIDEO_FILE),
            landmark_data: directory.join(LANDMARK_DATA_FILE),
            annotated_video: directory.join(ANNOTATED_VIDEO_FILE),
            analysis_data: directory.join(ANALYSIS_DATA_FILE),
            session_config: directory.join(SESSION_CONFIG_FILE),
        }
    }

    /// Final artifact paths.
    pub fn artifacts(&self) -> [&Path; 5] {
        [
            &self.session_config,
            &self.raw_video,
            &self.landmark_data,
            &self.analysis_data,
            &self.annotated_video,
        ]
    }

    /// File names a session directory may contain: every artifact plus its
    /// staging name.
    pub fn manifest(&self) -> Vec<PathBuf> {
        self.artifacts()
            .into_iter()
            .flat_map(|path| [path.to_path_buf(), staging_path(path)])
            .filter_map(|path| path.file_name().map(PathBuf::from))
            .collect()
    }

    /// Whether a directory entry named `name` belongs to the session.
    pub fn is_managed(&self, name: &OsStr) -> bool {
        self.manifest().iter().any(|m| m.as_os_str() == name)
    }
}

/// `<stem>.partial.<ext>` next to `path`.
pub fn staging_path(path: &Path) -> PathBuf {
    let stem = path.file_stem().unwrap_or_default().to_string_lossy();
    let name = match path.extension() {
        Some(ext) => format!("{stem}.{STAGING_MARKER}.{}", ext.to_string_lossy()),
        None => format!("{stem}.{STAGING_MARKER}"),
    };
    path.with_file_name(name)
}
