//! Decoded frame sequences with normalized presentation timestamps.

use crate::error::Result;
use crate::frame::FrameBuffer;

/// One decoded frame and its presentation time in seconds.
#[derive(Debug, Clone)]
pub struct TimedFrame {
    pub frame: FrameBuffer,
    pub pts: f64,
}

impl TimedFrame {
    pub fn new(frame: FrameBuffer, pts: f64) -> Self {
        Self { frame, pts }
    }
}

/// A lazy, forward-only, single-pass sequence of decoded frames.
///
/// Implementations own their decode resources and release them on drop,
/// whether the sequence was exhausted, abandoned early or failed.
pub trait FrameTimeline: Iterator<Item = Result<TimedFrame>> + Send {
    /// Expected number of frames, when the container reports one.
    fn frame_count_hint(&self) -> Option<u64>;

    /// Output frame dimensions.
    fn dimensions(&self) -> (u32, u32);
}

impl<T: FrameTimeline + ?Sized> FrameTimeline for Box<T> {
    fn frame_count_hint(&self) -> Option<u64> {
        (**self).frame_count_hint()
    }

    fn dimensions(&self) -> (u32, u32) {
        (**self).dimensions()
    }
}

/// Shift a timestamp sequence to start at zero and clamp it non-decreasing.
pub fn normalize_timestamps(raw: &[f64]) -> Vec<f64> {
    let Some(&origin) = raw.first() else {
        return Vec::new();
    };
    let mut floor = 0.0_f64;
    raw.iter()
        .map(|t| {
            floor = floor.max(t - origin);
            floor
        })
        .collect()
}

/// Streaming form of [`normalize_timestamps`] over any timeline.
pub struct NormalizedTimeline<T> {
    inner: T,
    origin: Option<f64>,
    floor: f64,
}

impl<T: FrameTimeline> NormalizedTimeline<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            origin: None,
            floor: 0.0,
        }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: FrameTimeline> Iterator for NormalizedTimeline<T> {
    type Item = Result<TimedFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.inner.next()?;
        Some(item.map(|mut timed| {
            let origin = *self.origin.get_or_insert(timed.pts);
            let shifted = timed.pts - origin;
            if shifted < self.floor {
                tracing::trace!(
                    pts = timed.pts,
                    clamped_to = self.floor,
                    "clamping non-monotonic timestamp"
                );
            }
            self.floor = self.floor.max(shifted);
            timed.pts = self.floor;
            timed
        }))
    }
}

impl<T: FrameTimeline> FrameTimeline for NormalizedTimeline<T> {
    fn frame_count_hint(&self) -> Option<u64> {
        self.inner.frame_count_hint()
    }

    fn dimensions(&self) -> (u32, u32) {
        self.inner.dimensions()
    }
}

/// An in-memory timeline, handy for tests and synthetic sources.
pub struct MemoryTimeline {
    frames: std::vec::IntoIter<TimedFrame>,
    count: u64,
    dimensions: (u32, u32),
}

impl MemoryTimeline {
    pub fn new(frames: Vec<TimedFrame>) -> Self {
        let dimensions = frames
            .first()
            .map(|f| f.frame.dimensions())
            .unwrap_or((0, 0));
        Self {
            count: frames.len() as u64,
            frames: frames.into_iter(),
            dimensions,
        }
    }
}

impl Iterator for MemoryTimeline {
    type Item = Result<TimedFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.frames.next().map(Ok)
    }
}

impl FrameTimeline for MemoryTimeline {
    fn frame_count_hint(&self) -> Option<u64> {
        Some(self.count)
    }

    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }
}
