//! Drawing primitives on RGB frame buffers.

use rayon::prelude::*;
use rowio_core::{FrameBuffer, Result, Rgb, RowioError};
use rowio_pose::Landmark;

/// A pixel position. May lie outside the frame; drawing is clipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

impl From<Landmark> for Point {
    fn from(lm: Landmark) -> Self {
        Self::new(lm.x as i64, lm.y as i64)
    }
}

/// Line, circle and blend operations used by the annotator.
pub trait Painter: Send + Sync {
    /// Draw a line of the given thickness from `from` to `to`, both ends
    /// inclusive.
    fn line(&self, frame: &mut FrameBuffer, from: Point, to: Point, colour: Rgb, thickness: u32);

    /// Draw a circle outline, or a disc when `filled`.
    fn circle(&self, frame: &mut FrameBuffer, centre: Point, radius: u32, colour: Rgb, filled: bool);

    /// `overlay * alpha + base * (1 - alpha)`, rounded per channel.
    fn blend(&self, overlay: &FrameBuffer, base: &FrameBuffer, alpha: f64) -> Result<FrameBuffer>;
}

/// CPU rasterizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwarePainter;

impl SoftwarePainter {
    pub fn new() -> Self {
        Self
    }
}

fn fill_disc(frame: &mut FrameBuffer, centre: Point, radius: i64, colour: Rgb) {
    let (width, height) = frame.dimensions();
    let x_lo = centre.x.saturating_sub(radius).max(0);
    let x_hi = centre.x.saturating_add(radius).min(i64::from(width) - 1);
    let y_lo = centre.y.saturating_sub(radius).max(0);
    let y_hi = centre.y.saturating_add(radius).min(i64::from(height) - 1);
    let r2 = radius.saturating_mul(radius);
    for y in y_lo..=y_hi {
        let dy = y - centre.y;
        for x in x_lo..=x_hi {
            let dx = x - centre.x;
            if dx * dx + dy * dy <= r2 {
                frame.set_pixel(x, y, colour);
            }
        }
    }
}

/// True when the square of half-width `reach` around `centre` touches the
/// frame.
fn touches_frame(frame: &FrameBuffer, centre: Point, reach: i64) -> bool {
    let (width, height) = frame.dimensions();
    centre.x.saturating_add(reach) >= 0
        && centre.y.saturating_add(reach) >= 0
        && centre.x.saturating_sub(reach) < i64::from(width)
        && centre.y.saturating_sub(reach) < i64::from(height)
}

/// Clip a segment to the frame grown by `margin` on every side
/// (Liang-Barsky). `None` when nothing of it is visible.
fn clip_segment(frame: &FrameBuffer, from: Point, to: Point, margin: i64) -> Option<(Point, Point)> {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return None;
    }
    let m = margin as f64;
    let (x_min, x_max) = (-m, f64::from(width - 1) + m);
    let (y_min, y_max) = (-m, f64::from(height - 1) + m);

    let (x0, y0) = (from.x as f64, from.y as f64);
    let (dx, dy) = (to.x as f64 - x0, to.y as f64 - y0);
    let (mut t0, mut t1) = (0.0f64, 1.0f64);
    for (p, q) in [
        (-dx, x0 - x_min),
        (dx, x_max - x0),
        (-dy, y0 - y_min),
        (dy, y_max - y0),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }

    let at = |t: f64| Point::new((x0 + t * dx).round() as i64, (y0 + t * dy).round() as i64);
    Some((at(t0), at(t1)))
}

fn plot_octants(frame: &mut FrameBuffer, c: Point, x: i64, y: i64, colour: Rgb) {
    for (dx, dy) in [
        (x, y),
        (y, x),
        (-y, x),
        (-x, y),
        (-x, -y),
        (-y, -x),
        (y, -x),
        (x, -y),
    ] {
        frame.set_pixel(c.x + dx, c.y + dy, colour);
    }
}

impl Painter for SoftwarePainter {
    fn line(&self, frame: &mut FrameBuffer, from: Point, to: Point, colour: Rgb, thickness: u32) {
        let half = i64::from(thickness.max(1) - 1) / 2;
        let stamp = |frame: &mut FrameBuffer, x: i64, y: i64| {
            if half == 0 {
                frame.set_pixel(x, y, colour);
            } else {
                fill_disc(frame, Point::new(x, y), half, colour);
            }
        };

        let Some((from, to)) = clip_segment(frame, from, to, half) else {
            return;
        };

        // Bresenham, all octants.
        let dx = (to.x - from.x).abs();
        let dy = -(to.y - from.y).abs();
        let sx = if from.x < to.x { 1 } else { -1 };
        let sy = if from.y < to.y { 1 } else { -1 };
        let mut err = dx + dy;
        let (mut x, mut y) = (from.x, from.y);
        loop {
            stamp(frame, x, y);
            if x == to.x && y == to.y {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    fn circle(&self, frame: &mut FrameBuffer, centre: Point, radius: u32, colour: Rgb, filled: bool) {
        let radius = i64::from(radius);
        if !touches_frame(frame, centre, radius) {
            return;
        }
        if filled {
            fill_disc(frame, centre, radius, colour);
            return;
        }
        let (mut x, mut y) = (radius, 0i64);
        let mut err = 1 - radius;
        while x >= y {
            plot_octants(frame, centre, x, y, colour);
            y += 1;
            if err < 0 {
                err += 2 * y + 1;
            } else {
                x -= 1;
                err += 2 * (y - x) + 1;
            }
        }
    }

    fn blend(&self, overlay: &FrameBuffer, base: &FrameBuffer, alpha: f64) -> Result<FrameBuffer> {
        if overlay.dimensions() != base.dimensions() {
            return Err(RowioError::Validation(format!(
                "cannot blend {:?} onto {:?}",
                overlay.dimensions(),
                base.dimensions()
            )));
        }
        if !(0.0..=1.0).contains(&alpha) {
            return Err(RowioError::Validation(format!(
                "blend alpha must be within 0-1, got {alpha}"
            )));
        }

        let (width, height) = base.dimensions();
        let mut out = FrameBuffer::new(width, height);
        let row = (width as usize * 3).max(1);
        let beta = 1.0 - alpha;
        out.as_bytes_mut()
            .par_chunks_mut(row)
            .zip(overlay.as_bytes().par_chunks(row))
            .zip(base.as_bytes().par_chunks(row))
            .for_each(|((dst, over), under)| {
                for ((d, &o), &b) in dst.iter_mut().zip(over).zip(under) {
                    let v = f64::from(o) * alpha + f64::from(b) * beta;
                    *d = v.round().clamp(0.0, 255.0) as u8;
                }
            });
        Ok(out)
    }
}
