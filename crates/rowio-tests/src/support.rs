//! Shared fixtures for the integration tests.

use rowio_core::{FrameBuffer, FrameRate, Result, Rgb, TimedFrame, VideoCodec};
use rowio_media::RawCodec;
use rowio_pose::{DetectedPose, NormalizedLandmark};
use rowio_render::SoftwarePainter;
use rowio_session::{PipelineSettings, SessionManager};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const WIDTH: u32 = 32;
pub const HEIGHT: u32 = 24;

/// A temp directory with a sessions root and a manager over the raw codec.
pub struct Workspace {
    pub dir: tempfile::TempDir,
    pub manager: Arc<SessionManager>,
}

impl Workspace {
    pub fn new(rate: FrameRate) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut settings = PipelineSettings::default();
        settings.sessions_root = dir.path().join("sessions");
        settings.target_fps = rate;
        settings.target_width = WIDTH;
        settings.target_height = HEIGHT;
        settings.keepalive_secs = 1;
        settings.progress_step = 10.0;
        let manager = SessionManager::new(
            settings,
            Arc::new(RawCodec::new()),
            Arc::new(SoftwarePainter::new()),
        )
        .expect("valid settings");
        Self {
            dir,
            manager: Arc::new(manager),
        }
    }

    /// Write a source video with one distinct frame per timestamp.
    pub fn source(&self, timestamps: &[f64]) -> PathBuf {
        let path = self.dir.path().join("source.rwio");
        write_source(&path, timestamps);
        path
    }
}

/// Frame `i` of every synthetic source.
pub fn source_frame(i: usize) -> FrameBuffer {
    FrameBuffer::filled(WIDTH, HEIGHT, Rgb((i % 251) as u8, (i / 251) as u8, 90))
}

pub fn write_source(path: &Path, timestamps: &[f64]) {
    let frames = timestamps
        .iter()
        .enumerate()
        .map(|(i, &pts)| TimedFrame::new(source_frame(i), pts));
    RawCodec::write_timeline(path, WIDTH, HEIGHT, frames).expect("write source");
}

/// `n` timestamps spaced at `1/fps`.
pub fn cfr_timestamps(n: usize, fps: f64) -> Vec<f64> {
    (0..n).map(|i| i as f64 / fps).collect()
}

/// Content hashes of every frame in `path`.
pub fn frame_hashes(path: &Path) -> Vec<u64> {
    RawCodec::new()
        .open(path, &Default::default())
        .expect("open video")
        .map(|item| item.expect("decode frame").frame.content_hash())
        .collect()
}

/// Sorted names of the entries in `dir`.
pub fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("read dir")
        .map(|e| e.expect("dir entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// A rower sitting mid-frame, reported by name.
pub fn rower_pose() -> DetectedPose {
    let points = [
        ("shoulder", 0.5, 0.3),
        ("elbow", 0.6, 0.4),
        ("hip", 0.45, 0.7),
        ("knee", 0.65, 0.6),
        ("ankle", 0.8, 0.8),
    ];
    DetectedPose::Named(
        points
            .into_iter()
            .map(|(name, x, y)| (name.to_string(), NormalizedLandmark::new(x, y, 0.99)))
            .collect::<BTreeMap<_, _>>(),
    )
}

/// Detector that finds the rower on every frame except the 1-based
/// indices in `misses`.
pub fn scripted_detector(
    misses: Vec<u64>,
) -> impl FnMut(&FrameBuffer) -> Result<Option<DetectedPose>> + Send + 'static {
    let mut frame = 0u64;
    move |_: &FrameBuffer| {
        frame += 1;
        Ok((!misses.contains(&frame)).then(rower_pose))
    }
}
