//! Pose overlay rendering.
//!
//! [`FrameAnnotator`] turns a frame and its landmarks into an annotated
//! frame. Drawing goes through the [`Painter`] trait; [`SoftwarePainter`]
//! rasterizes on the CPU and blends rows in parallel.

pub mod annotator;
pub mod painter;
pub mod preferences;

pub use annotator::FrameAnnotator;
pub use painter::{Painter, Point, SoftwarePainter};
pub use preferences::{AnnotationPreferences, MAX_LANDMARK_RADIUS, MAX_THICKNESS};
