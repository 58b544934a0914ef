//! RowIO Core - Foundation types for the pose pipeline
//!
//! This crate provides the types shared by every pipeline stage:
//! - Error taxonomy (RowioError, ErrorKind)
//! - RGB frame buffers and time representation (FrameRate, RationalTime)
//! - Frame timelines with timestamp normalization
//! - Constant-frame-rate resampling
//! - Cooperative cancellation and progress reporting
//! - Codec traits implemented by the media crate

pub mod cancel;
pub mod codec;
pub mod error;
pub mod frame;
pub mod progress;
pub mod resample;
pub mod time;
pub mod timeline;

pub use cancel::CancellationToken;
pub use codec::{DecodeOptions, EncodeSettings, FrameWriter, VideoCodec, VideoMetadata};
pub use error::{ErrorKind, Result, RowioError};
pub use frame::{FrameBuffer, Rgb};
pub use progress::{OperationControls, ProgressCallback, ProgressReporter, DEFAULT_PROGRESS_STEP};
pub use resample::{plan_cfr, CfrPlan, CfrResampler, CfrStats, GridPoint, PlanNote};
pub use time::{FrameRate, RationalTime};
pub use timeline::{
    normalize_timestamps, FrameTimeline, MemoryTimeline, NormalizedTimeline, TimedFrame,
};
