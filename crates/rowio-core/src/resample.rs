//! Constant-frame-rate resampling.
//!
//! Maps an irregular, normalized timeline onto the uniform grid
//! `t_k = k / R` for `k = 0 ..= floor(D·R + ½ − ε)`, where `D` is the last
//! source timestamp. Every grid point takes the single nearest source frame:
//! the right candidate is the first source with `t >= t_k` (or the last
//! source when none is), the left candidate is the source just before it,
//! and equal distances resolve to the left candidate. Pixel data is never
//! blended, so slow sources get duplicated frames and fast sources get
//! dropped ones.

use serde::{Deserialize, Serialize};

use crate::error::{Result, RowioError};
use crate::time::{FrameRate, RationalTime};

/// Slack applied when computing the last grid index.
const GRID_EPSILON: f64 = 1e-9;

/// One output slot on the CFR grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridPoint {
    /// Output frame index, 0-based.
    pub index: u64,
    /// Exact grid instant.
    pub time: RationalTime,
    /// Ordinal of the chosen source frame, 0-based.
    pub source_index: u64,
}

/// How a resampling pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanNote {
    /// The input timeline had no frames; nothing was produced.
    Empty,
    /// The input was mapped onto a grid at `fps`.
    Resampled { fps: f64 },
}

impl PlanNote {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Counters gathered over one resampling pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CfrStats {
    pub sources: u64,
    pub emitted: u64,
    /// Output frames that repeat the previous output's source.
    pub duplicated: u64,
    /// Source frames never selected.
    pub dropped: u64,
}

/// Index of the last grid point for a timeline ending at `duration`.
pub fn last_grid_index(duration: f64, rate: FrameRate) -> u64 {
    let scaled = (duration.max(0.0) * rate.to_fps_f64() + 0.5 - GRID_EPSILON).floor();
    if scaled <= 0.0 {
        0
    } else {
        scaled as u64
    }
}

/// Streaming resampler.
///
/// Feed source items in timestamp order with [`push`](Self::push); each grid
/// point is emitted as soon as it can be decided, so at most two source
/// items are held at once. Call [`finish`](Self::finish) to flush the tail.
pub struct CfrResampler<T> {
    rate: FrameRate,
    next_k: u64,
    /// Most recent source and the one before it, with their timestamps.
    prev: Option<(T, f64)>,
    prev_prev: Option<(T, f64)>,
    sources: u64,
    emitted: u64,
    duplicated: u64,
    distinct: u64,
    last_source: Option<u64>,
}

impl<T> CfrResampler<T> {
    pub fn new(rate: FrameRate) -> Result<Self> {
        Ok(Self {
            rate: rate.validate()?,
            next_k: 0,
            prev: None,
            prev_prev: None,
            sources: 0,
            emitted: 0,
            duplicated: 0,
            distinct: 0,
            last_source: None,
        })
    }

    pub fn rate(&self) -> FrameRate {
        self.rate
    }

    /// Counters so far.
    pub fn stats(&self) -> CfrStats {
        CfrStats {
            sources: self.sources,
            emitted: self.emitted,
            duplicated: self.duplicated,
            dropped: self.sources - self.distinct,
        }
    }

    /// Add the next source item.
    ///
    /// Timestamps earlier than the previous one are clamped to it.
    pub fn push<F>(&mut self, item: T, pts: f64, mut emit: F) -> Result<()>
    where
        F: FnMut(GridPoint, &T) -> Result<()>,
    {
        if !pts.is_finite() {
            return Err(RowioError::Validation(format!(
                "source timestamp must be finite, got {pts}"
            )));
        }
        let pts = match &self.prev {
            Some((_, last)) => pts.max(*last),
            None => pts,
        };
        let right_index = self.sources;

        // Every pending grid point at or before `pts` has this item as its
        // right candidate and `prev` as its left.
        loop {
            let time = self.rate.frame_time(self.next_k);
            let t = time.to_seconds_f64();
            if t > pts {
                break;
            }
            let take_left = match &self.prev {
                Some((_, left_pts)) => (left_pts - t).abs() <= (pts - t).abs(),
                None => false,
            };
            let source = if take_left { right_index - 1 } else { right_index };
            let point = self.point(time, source);
            match &self.prev {
                Some((left, _)) if take_left => emit(point, left)?,
                _ => emit(point, &item)?,
            }
        }

        self.prev_prev = self.prev.take();
        self.prev = Some((item, pts));
        self.sources += 1;
        Ok(())
    }

    /// Flush grid points past the last source timestamp.
    pub fn finish<F>(&mut self, mut emit: F) -> Result<PlanNote>
    where
        F: FnMut(GridPoint, &T) -> Result<()>,
    {
        let duration = match &self.prev {
            Some((_, pts)) => *pts,
            None => return Ok(PlanNote::Empty),
        };
        let left_pts = self.prev_prev.as_ref().map(|(_, pts)| *pts);
        let k_max = last_grid_index(duration, self.rate);
        let last_index = self.sources - 1;

        // Past the last source the right candidate is always the last item.
        while self.next_k <= k_max {
            let time = self.rate.frame_time(self.next_k);
            let t = time.to_seconds_f64();
            let take_left = left_pts
                .map(|left| (left - t).abs() <= (duration - t).abs())
                .unwrap_or(false);
            let source = if take_left { last_index - 1 } else { last_index };
            let point = self.point(time, source);
            match (&self.prev_prev, &self.prev) {
                (Some((left, _)), _) if take_left => emit(point, left)?,
                (_, Some((right, _))) => emit(point, right)?,
                (_, None) => break,
            }
        }

        let stats = self.stats();
        tracing::debug!(
            fps = self.rate.to_fps_f64(),
            sources = stats.sources,
            emitted = stats.emitted,
            duplicated = stats.duplicated,
            dropped = stats.dropped,
            "CFR resampling finished"
        );
        Ok(PlanNote::Resampled {
            fps: self.rate.to_fps_f64(),
        })
    }

    /// Record an emission at the current grid index and advance it.
    fn point(&mut self, time: RationalTime, source_index: u64) -> GridPoint {
        let point = GridPoint {
            index: self.next_k,
            time,
            source_index,
        };
        match self.last_source {
            Some(last) if last == source_index => self.duplicated += 1,
            _ => self.distinct += 1,
        }
        self.last_source = Some(source_index);
        self.emitted += 1;
        self.next_k += 1;
        point
    }
}

/// A fully materialized resampling plan.
#[derive(Debug, Clone, PartialEq)]
pub struct CfrPlan {
    /// Grid instants in seconds.
    pub grid: Vec<f64>,
    /// Chosen source index per grid instant.
    pub source_indices: Vec<usize>,
    pub note: PlanNote,
}

impl CfrPlan {
    pub fn len(&self) -> usize {
        self.grid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grid.is_empty()
    }
}

/// Batch form of [`CfrResampler`] over normalized timestamps.
pub fn plan_cfr(timestamps: &[f64], rate: FrameRate) -> Result<CfrPlan> {
    let mut resampler = CfrResampler::new(rate)?;
    let mut grid = Vec::new();
    let mut source_indices = Vec::new();

    let mut record = |point: GridPoint, _: &usize| -> Result<()> {
        grid.push(point.time.to_seconds_f64());
        source_indices.push(point.source_index as usize);
        Ok(())
    };
    for (i, pts) in timestamps.iter().enumerate() {
        resampler.push(i, *pts, &mut record)?;
    }
    let note = resampler.finish(&mut record)?;

    Ok(CfrPlan {
        grid,
        source_indices,
        note,
    })
}
