//! How the pose overlay looks.

use rowio_core::{Result, Rgb, RowioError};
use serde::{Deserialize, Serialize};

/// Overlay styling.
///
/// Deserialization runs [`AnnotationPreferences::validate`]; values built in
/// code should be validated before use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAnnotationPreferences")]
pub struct AnnotationPreferences {
    pub bone_colour: Rgb,
    pub bone_thickness: u32,
    pub landmark_colour: Rgb,
    pub landmark_radius: u32,
    pub reference_line_colour: Rgb,
    /// Length in pixels, measured upward from the landmark.
    pub reference_line_length: u32,
    pub reference_line_thickness: u32,
    /// Dash and gap length in pixels. Zero draws a solid line.
    pub reference_line_dash_factor: u32,
    pub opacity: f64,
}

#[derive(Deserialize)]
struct RawAnnotationPreferences {
    bone_colour: Rgb,
    bone_thickness: i64,
    landmark_colour: Rgb,
    landmark_radius: i64,
    reference_line_colour: Rgb,
    reference_line_length: i64,
    reference_line_thickness: i64,
    reference_line_dash_factor: i64,
    opacity: f64,
}

fn pixels(name: &str, value: i64, min: u32) -> Result<u32> {
    match u32::try_from(value) {
        Ok(v) if v >= min => Ok(v),
        _ => Err(RowioError::Validation(format!(
            "{name} must be at least {min}, got {value}"
        ))),
    }
}

impl TryFrom<RawAnnotationPreferences> for AnnotationPreferences {
    type Error = RowioError;

    fn try_from(raw: RawAnnotationPreferences) -> Result<Self> {
        let prefs = Self {
            bone_colour: raw.bone_colour,
            bone_thickness: pixels("bone_thickness", raw.bone_thickness, 1)?,
            landmark_colour: raw.landmark_colour,
            landmark_radius: pixels("landmark_radius", raw.landmark_radius, 1)?,
            reference_line_colour: raw.reference_line_colour,
            reference_line_length: pixels("reference_line_length", raw.reference_line_length, 1)?,
            reference_line_thickness: pixels(
                "reference_line_thickness",
                raw.reference_line_thickness,
                1,
            )?,
            reference_line_dash_factor: pixels(
                "reference_line_dash_factor",
                raw.reference_line_dash_factor,
                0,
            )?,
            opacity: raw.opacity,
        };
        prefs.validate()?;
        Ok(prefs)
    }
}

/// Largest accepted line thickness, in pixels.
pub const MAX_THICKNESS: u32 = 64;
/// Largest accepted landmark radius, in pixels.
pub const MAX_LANDMARK_RADIUS: u32 = 128;

impl AnnotationPreferences {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("bone_thickness", self.bone_thickness),
            ("landmark_radius", self.landmark_radius),
            ("reference_line_length", self.reference_line_length),
            ("reference_line_thickness", self.reference_line_thickness),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(RowioError::Validation(format!("{name} must be positive")));
        }
        let bounded = [
            ("bone_thickness", self.bone_thickness, MAX_THICKNESS),
            ("reference_line_thickness", self.reference_line_thickness, MAX_THICKNESS),
            ("landmark_radius", self.landmark_radius, MAX_LANDMARK_RADIUS),
        ];
        if let Some((name, value, max)) = bounded.iter().find(|(_, v, max)| v > max) {
            return Err(RowioError::Validation(format!(
                "{name} must be at most {max}, got {value}"
            )));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(RowioError::Validation(format!(
                "opacity must be within 0-1, got {}",
                self.opacity
            )));
        }
        Ok(())
    }
}

impl Default for AnnotationPreferences {
    fn default() -> Self {
        Self {
            bone_colour: Rgb(255, 255, 255),
            bone_thickness: 2,
            landmark_colour: Rgb(255, 64, 64),
            landmark_radius: 5,
            reference_line_colour: Rgb(64, 200, 255),
            reference_line_length: 300,
            reference_line_thickness: 1,
            reference_line_dash_factor: 10,
            opacity: 0.7,
        }
    }
}
