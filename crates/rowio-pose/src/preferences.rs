//! Pose detector preferences.

use rowio_core::{Result, RowioError};
use serde::{Deserialize, Serialize};

/// Settings forwarded to the pose detector.
///
/// Ranges are checked on construction and on deserialization, so a value
/// of this type is always valid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDetectorPreferences")]
pub struct DetectorPreferences {
    model_complexity: u8,
    smooth_landmarks: bool,
    min_detection_confidence: f64,
    min_tracking_confidence: f64,
}

#[derive(Deserialize)]
struct RawDetectorPreferences {
    model_complexity: i64,
    smooth_landmarks: bool,
    min_detection_confidence: f64,
    min_tracking_confidence: f64,
}

impl TryFrom<RawDetectorPreferences> for DetectorPreferences {
    type Error = RowioError;

    fn try_from(raw: RawDetectorPreferences) -> Result<Self> {
        let complexity = u8::try_from(raw.model_complexity).map_err(|_| {
            RowioError::Validation(format!(
                "model_complexity must be 0-2, got {}",
                raw.model_complexity
            ))
        })?;
        Self::new(
            complexity,
            raw.smooth_landmarks,
            raw.min_detection_confidence,
            raw.min_tracking_confidence,
        )
    }
}

fn unit_interval(name: &str, value: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(RowioError::Validation(format!(
            "{name} must be within 0-1, got {value}"
        )))
    }
}

impl DetectorPreferences {
    pub fn new(
        model_complexity: u8,
        smooth_landmarks: bool,
        min_detection_confidence: f64,
        min_tracking_confidence: f64,
    ) -> Result<Self> {
        if model_complexity > 2 {
            return Err(RowioError::Validation(format!(
                "model_complexity must be 0-2, got {model_complexity}"
            )));
        }
        Ok(Self {
            model_complexity,
            smooth_landmarks,
            min_detection_confidence: unit_interval(
                "min_detection_confidence",
                min_detection_confidence,
            )?,
            min_tracking_confidence: unit_interval(
                "min_tracking_confidence",
                min_tracking_confidence,
            )?,
        })
    }

    pub fn model_complexity(&self) -> u8 {
        self.model_complexity
    }

    pub fn smooth_landmarks(&self) -> bool {
        self.smooth_landmarks
    }

    pub fn min_detection_confidence(&self) -> f64 {
        self.min_detection_confidence
    }

    pub fn min_tracking_confidence(&self) -> f64 {
        self.min_tracking_confidence
    }

    /// Command-line form passed to a detector process.
    pub fn to_args(&self) -> Vec<String> {
        vec![
            "--model-complexity".into(),
            self.model_complexity.to_string(),
            "--smooth-landmarks".into(),
            self.smooth_landmarks.to_string(),
            "--min-detection-confidence".into(),
            self.min_detection_confidence.to_string(),
            "--min-tracking-confidence".into(),
            self.min_tracking_confidence.to_string(),
        ]
    }
}

impl Default for DetectorPreferences {
    fn default() -> Self {
        Self {
            model_complexity: 1,
            smooth_landmarks: true,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
        }
    }
}
