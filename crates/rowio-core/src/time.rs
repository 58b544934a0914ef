//! Time representation for constant-frame-rate grids
//!
//! Grid instants are rational so that `k / R` never accumulates
//! floating-point drift over long videos. Source timestamps arrive as
//! seconds in `f64` and are compared against the grid in `f64`.

use num_rational::Rational64;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

use crate::error::{Result, RowioError};

/// A rational time value in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RationalTime {
    value: Rational64,
}

impl RationalTime {
    /// `numerator / denominator` seconds.
    #[inline]
    pub fn new(numerator: i64, denominator: i64) -> Self {
        Self {
            value: Rational64::new(numerator, denominator),
        }
    }

    /// Time of frame `frames` at `rate`.
    #[inline]
    pub fn from_frames(frames: i64, rate: FrameRate) -> Self {
        Self {
            value: Rational64::new(frames * rate.denominator as i64, rate.numerator as i64),
        }
    }

    #[inline]
    pub fn to_seconds_f64(self) -> f64 {
        *self.value.numer() as f64 / *self.value.denom() as f64
    }

    pub const ZERO: Self = Self {
        value: Rational64::new_raw(0, 1),
    };
}

impl Default for RationalTime {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Add for RationalTime {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            value: self.value + rhs.value,
        }
    }
}

impl Sub for RationalTime {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self {
            value: self.value - rhs.value,
        }
    }
}

impl fmt::Display for RationalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.to_seconds_f64())
    }
}

/// Frame rate as a rational number (e.g., 30000/1001 for 29.97 fps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRate {
    pub numerator: u32,
    pub denominator: u32,
}

impl FrameRate {
    #[inline]
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Reject zero or degenerate rates.
    pub fn validate(self) -> Result<Self> {
        if self.numerator == 0 || self.denominator == 0 {
            return Err(RowioError::Validation(format!(
                "frame rate {}/{} must be positive",
                self.numerator, self.denominator
            )));
        }
        Ok(self)
    }

    /// Recover a rational rate from a float such as a probed `r_frame_rate`.
    ///
    /// Integral rates and the NTSC family (`n*1000/1001`) come back exact;
    /// anything else is approximated with a millisecond denominator.
    pub fn from_fps_f64(fps: f64) -> Result<Self> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(RowioError::Validation(format!(
                "frame rate must be positive, got {fps}"
            )));
        }
        let rounded = fps.round();
        if (fps - rounded).abs() < 1e-6 && rounded <= u32::MAX as f64 {
            return Ok(Self::new(rounded as u32, 1));
        }
        let ntsc = (fps * 1.001).round();
        if (fps - ntsc / 1.001).abs() < 1e-3 && ntsc * 1000.0 <= u32::MAX as f64 {
            return Ok(Self::new(ntsc as u32 * 1000, 1001));
        }
        let scaled = (fps * 1000.0).round();
        if scaled > u32::MAX as f64 {
            return Err(RowioError::Validation(format!(
                "frame rate {fps} out of range"
            )));
        }
        Ok(Self::new(scaled as u32, 1000))
    }

    #[inline]
    pub fn to_fps_f64(self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    /// Duration of a single frame.
    #[inline]
    pub fn frame_duration(self) -> RationalTime {
        RationalTime::new(self.denominator as i64, self.numerator as i64)
    }

    /// Exact instant of grid point `k`.
    #[inline]
    pub fn frame_time(self, k: u64) -> RationalTime {
        RationalTime::from_frames(k as i64, self)
    }

    pub const FPS_24: Self = Self::new(24, 1);
    pub const FPS_25: Self = Self::new(25, 1);
    pub const FPS_29_97: Self = Self::new(30000, 1001);
    pub const FPS_30: Self = Self::new(30, 1);
    pub const FPS_60: Self = Self::new(60, 1);
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::FPS_30
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fps = self.to_fps_f64();
        if (fps - fps.round()).abs() < 0.001 {
            write!(f, "{} fps", fps.round() as u32)
        } else {
            write!(f, "{:.3} fps", fps)
        }
    }
}
