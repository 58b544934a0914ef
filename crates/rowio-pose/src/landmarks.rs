//! Landmark positions and the per-session landmark table.

use rowio_core::{Result, RowioError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// A landmark position in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Landmark {
    pub x: i32,
    pub y: i32,
}

impl Landmark {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A landmark as reported by a detector, relative to the frame size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedLandmark {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub visibility: f64,
}

impl NormalizedLandmark {
    pub fn new(x: f64, y: f64, visibility: f64) -> Self {
        Self { x, y, visibility }
    }

    /// Scale to pixels, rounding to the nearest integer.
    pub fn to_pixel(self, width: u32, height: u32) -> Landmark {
        Landmark {
            x: (self.x * width as f64).round() as i32,
            y: (self.y * height as f64).round() as i32,
        }
    }
}

/// Detector output for a single frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DetectedPose {
    /// Full topology, indexed by landmark number.
    Indexed(Vec<NormalizedLandmark>),
    /// Already-named landmarks.
    Named(BTreeMap<String, NormalizedLandmark>),
}

/// Named landmarks of one frame.
pub type FrameLandmarks = BTreeMap<String, Landmark>;

/// Landmark entry as found on disk: pixels, or the normalized shape.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredLandmark {
    Normalized {
        x: f64,
        y: f64,
        #[allow(dead_code)]
        visibility: f64,
    },
    Pixel {
        x: i64,
        y: i64,
    },
    Fractional {
        x: f64,
        y: f64,
    },
}

impl StoredLandmark {
    fn into_pixel(self, width: u32, height: u32) -> Result<Landmark> {
        let clamp = |v: i64| {
            i32::try_from(v).map_err(|_| {
                RowioError::Serialization(format!("landmark coordinate {v} out of range"))
            })
        };
        match self {
            Self::Pixel { x, y } => Ok(Landmark::new(clamp(x)?, clamp(y)?)),
            Self::Normalized { x, y, .. } | Self::Fractional { x, y } => {
                Ok(NormalizedLandmark::new(x, y, 0.0).to_pixel(width, height))
            }
        }
    }
}

/// 1-based frame index to named pixel landmarks.
///
/// Frames without a detection are simply absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkTable {
    frames: BTreeMap<u64, FrameLandmarks>,
}

impl LandmarkTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, frame: u64, landmarks: FrameLandmarks) {
        self.frames.insert(frame, landmarks);
    }

    pub fn get(&self, frame: u64) -> Option<&FrameLandmarks> {
        self.frames.get(&frame)
    }

    pub fn contains(&self, frame: u64) -> bool {
        self.frames.contains_key(&frame)
    }

    /// Number of frames with landmarks.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &FrameLandmarks)> {
        self.frames.iter().map(|(k, v)| (*k, v))
    }

    /// Write as pretty JSON to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| RowioError::Serialization(e.to_string()))?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Read a landmark file.
    ///
    /// Normalized entries are scaled by `width` x `height`.
    pub fn load(path: &Path, width: u32, height: u32) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| {
            RowioError::NotFound(format!("landmark file {}: {e}", path.display()))
        })?;
        Self::from_json(&json, width, height)
    }

    pub fn from_json(json: &str, width: u32, height: u32) -> Result<Self> {
        let raw: BTreeMap<u64, BTreeMap<String, StoredLandmark>> =
            serde_json::from_str(json).map_err(|e| RowioError::Serialization(e.to_string()))?;
        let mut frames = BTreeMap::new();
        for (frame, entries) in raw {
            if frame == 0 {
                return Err(RowioError::Serialization(
                    "landmark frame indices start at 1".into(),
                ));
            }
            let landmarks = entries
                .into_iter()
                .map(|(name, stored)| Ok((name, stored.into_pixel(width, height)?)))
                .collect::<Result<FrameLandmarks>>()?;
            frames.insert(frame, landmarks);
        }
        Ok(Self { frames })
    }
}
