//! Pose overlay for a single frame.

use rowio_core::{FrameBuffer, Result};
use rowio_pose::{FrameLandmarks, Skeleton};
use std::sync::Arc;
use tracing::debug;

use crate::painter::{Painter, Point};
use crate::preferences::AnnotationPreferences;

/// Draws bones, landmark dots and dashed reference lines onto frames.
pub struct FrameAnnotator {
    skeleton: Skeleton,
    preferences: AnnotationPreferences,
    painter: Arc<dyn Painter>,
}

impl FrameAnnotator {
    pub fn new(
        skeleton: Skeleton,
        preferences: AnnotationPreferences,
        painter: Arc<dyn Painter>,
    ) -> Result<Self> {
        preferences.validate()?;
        Ok(Self {
            skeleton,
            preferences,
            painter,
        })
    }

    pub fn preferences(&self) -> &AnnotationPreferences {
        &self.preferences
    }

    /// Render the overlay onto a copy of `frame` and blend it back at the
    /// configured opacity.
    pub fn annotate(&self, frame: &FrameBuffer, landmarks: &FrameLandmarks) -> Result<FrameBuffer> {
        let mut overlay = frame.clone();
        self.draw(&mut overlay, landmarks);
        self.painter.blend(&overlay, frame, self.preferences.opacity)
    }

    /// Draw the overlay straight onto `canvas`.
    pub fn draw(&self, canvas: &mut FrameBuffer, landmarks: &FrameLandmarks) {
        let prefs = &self.preferences;

        for (a, b) in &self.skeleton.bones {
            match (landmarks.get(a), landmarks.get(b)) {
                (Some(&from), Some(&to)) => self.painter.line(
                    canvas,
                    from.into(),
                    to.into(),
                    prefs.bone_colour,
                    prefs.bone_thickness,
                ),
                _ => debug!(from = %a, to = %b, "bone endpoint missing, skipped"),
            }
        }

        for &landmark in landmarks.values() {
            self.painter.circle(
                canvas,
                landmark.into(),
                prefs.landmark_radius,
                prefs.landmark_colour,
                true,
            );
        }

        for root in &self.skeleton.reference_roots {
            if let Some(&landmark) = landmarks.get(root) {
                self.reference_line(canvas, landmark.into());
            }
        }
    }

    /// Dashed vertical line rising from `start`.
    fn reference_line(&self, canvas: &mut FrameBuffer, start: Point) {
        let prefs = &self.preferences;
        let end_y = start.y - i64::from(prefs.reference_line_length);
        let dash = i64::from(prefs.reference_line_dash_factor);
        let reach = i64::from(prefs.reference_line_thickness);
        let bottom = i64::from(canvas.dimensions().1) + reach;
        let mut draw = |from_y: i64, to_y: i64| {
            self.painter.line(
                &mut *canvas,
                Point::new(start.x, from_y),
                Point::new(start.x, to_y),
                prefs.reference_line_colour,
                prefs.reference_line_thickness,
            )
        };

        if dash == 0 {
            draw(start.y, end_y);
            return;
        }
        // Dashes stay in phase with `start`; only the visible run is walked.
        let period = 2 * dash;
        let mut y = start.y;
        if y > bottom {
            y -= (y - bottom) / period * period;
        }
        while y > end_y.max(-reach) {
            draw(y, (y - dash).max(end_y));
            y -= period;
        }
    }
}
