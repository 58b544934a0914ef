//! Session lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a session is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    New,
    DirectoryCreated,
    Transcoded,
    LandmarksExtracted,
    Annotated,
    Complete,
    Cancelled,
    Error,
}

impl SessionState {
    /// Position in the linear chain; `None` for the two escape states.
    fn rank(self) -> Option<u8> {
        match self {
            Self::New => Some(0),
            Self::DirectoryCreated => Some(1),
            Self::Transcoded => Some(2),
            Self::LandmarksExtracted => Some(3),
            Self::Annotated => Some(4),
            Self::Complete => Some(5),
            Self::Cancelled | Self::Error => None,
        }
    }

    /// States a stage leaves behind on success.
    pub fn is_stage_result(self) -> bool {
        matches!(
            self,
            Self::Transcoded | Self::LandmarksExtracted | Self::Annotated
        )
    }

    /// Whether the run that produced this state has ended.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Cancelled | Self::Error)
    }

    /// Legal moves:
    /// - one step forward along the chain;
    /// - into `Cancelled` or `Error` from any live state;
    /// - back to a stage result when that stage is re-run, including after a
    ///   cancelled or failed run.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        match (self.rank(), next.rank()) {
            (None, None) => false,
            (Some(from), None) => from > 0,
            (None, Some(_)) => next.is_stage_result(),
            (Some(from), Some(to)) => {
                to == from + 1 || (next.is_stage_result() && to <= from && from >= 2)
            }
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::New => "new",
            Self::DirectoryCreated => "directory_created",
            Self::Transcoded => "transcoded",
            Self::LandmarksExtracted => "landmarks_extracted",
            Self::Annotated => "annotated",
            Self::Complete => "complete",
            Self::Cancelled => "cancelled",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}
