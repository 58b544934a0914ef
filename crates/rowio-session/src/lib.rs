//! RowIO Session - session lifecycle and pipeline orchestration
//!
//! A session is a directory holding one source video's artifacts:
//! - `session_config.json` describing the session
//! - `raw.mp4`, the constant-frame-rate copy of the source
//! - `landmarks.json`, per-frame pose landmarks
//! - `annotated.mp4`, the raw video with the pose overlay
//!
//! [`SessionManager`] runs each stage against an explicit [`Session`]
//! handle; [`PipelineRunner`] runs all of them on a worker thread.

pub mod config;
pub mod events;
pub mod files;
pub mod manager;
pub mod runner;
pub mod session;
pub mod settings;
pub mod stages;
pub mod state;
pub mod title;

pub use config::{SessionConfig, SessionRecord, CURRENT_VERSION};
pub use events::{EventHub, EventStream, PipelineEvent, StreamItem};
pub use files::{staging_path, SessionFiles};
pub use manager::SessionManager;
pub use runner::{PipelineHandle, PipelineOutcome, PipelineRunner, RunOptions};
pub use session::Session;
pub use settings::PipelineSettings;
pub use stages::StageKind;
pub use state::SessionState;
pub use title::validate_title;
