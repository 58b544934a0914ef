//! RowIO Pose - pose landmarks and detector integration.

pub mod detector;
pub mod landmarks;
pub mod preferences;
pub mod skeleton;

pub use detector::{parse_reply, DetectorCommand, PoseDetector, ProcessDetector};
pub use landmarks::{DetectedPose, FrameLandmarks, Landmark, LandmarkTable, NormalizedLandmark};
pub use preferences::DetectorPreferences;
pub use skeleton::{LandmarkSpec, Skeleton, BLAZEPOSE_LANDMARK_COUNT};
