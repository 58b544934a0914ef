//! Which landmarks are tracked and how they are connected.

use serde::{Deserialize, Serialize};

use crate::landmarks::{DetectedPose, FrameLandmarks};

/// Points in the BlazePose full-body topology.
pub const BLAZEPOSE_LANDMARK_COUNT: usize = 33;

/// A tracked landmark and its index in the detector topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandmarkSpec {
    pub name: String,
    pub index: usize,
}

/// Named landmarks, the bones between them and the landmarks that get a
/// vertical reference line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skeleton {
    pub landmarks: Vec<LandmarkSpec>,
    pub bones: Vec<(String, String)>,
    pub reference_roots: Vec<String>,
}

impl Skeleton {
    /// Right-facing rower, camera on the athlete's right side.
    pub fn rower() -> Self {
        let landmarks = [
            ("ear", 8),
            ("shoulder", 12),
            ("elbow", 14),
            ("wrist", 16),
            ("hand", 20),
            ("hip", 24),
            ("knee", 26),
            ("ankle", 28),
        ]
        .into_iter()
        .map(|(name, index)| LandmarkSpec {
            name: name.to_string(),
            index,
        })
        .collect();

        let bones = [
            ("ear", "shoulder"),
            ("shoulder", "elbow"),
            ("elbow", "wrist"),
            ("wrist", "hand"),
            ("shoulder", "hip"),
            ("hip", "knee"),
            ("knee", "ankle"),
        ]
        .into_iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect();

        Self {
            landmarks,
            bones,
            reference_roots: vec!["ankle".into(), "hip".into()],
        }
    }

    /// Pick the tracked landmarks out of a detection and convert to pixels.
    ///
    /// Landmarks the detector did not report are left out.
    pub fn select(&self, pose: &DetectedPose, width: u32, height: u32) -> FrameLandmarks {
        self.landmarks
            .iter()
            .filter_map(|landmark| {
                let found = match pose {
                    DetectedPose::Indexed(points) => points.get(landmark.index),
                    DetectedPose::Named(points) => points.get(&landmark.name),
                };
                found.map(|p| (landmark.name.clone(), p.to_pixel(width, height)))
            })
            .collect()
    }
}

impl Default for Skeleton {
    fn default() -> Self {
        Self::rower()
    }
}
