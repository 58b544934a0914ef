//! Constant-frame-rate conversion through the transcode stage.

use crate::support::{cfr_timestamps, frame_hashes, source_frame, write_source, Workspace};
use crate::support::{HEIGHT, WIDTH};
use rowio_core::resample::last_grid_index;
use rowio_core::{plan_cfr, FrameBuffer, FrameRate, PlanNote, Rgb, RowioError, TimedFrame};
use rowio_media::RawCodec;
use rowio_session::{staging_path, SessionState};
use std::collections::HashMap;

// ── Helpers ───────────────────────────────────────────────────────

/// Transcode a source with the given timestamps and map every raw frame
/// back to the source ordinal it was copied from.
fn transcoded_indices(rate: FrameRate, timestamps: &[f64]) -> Vec<usize> {
    let ws = Workspace::new(rate);
    let source = ws.source(timestamps);
    let mut session = ws.manager.create("resample", &source, false).unwrap();
    ws.manager.transcode(&mut session, &ws.manager.controls()).unwrap();

    let by_hash: HashMap<u64, usize> = (0..timestamps.len())
        .map(|i| (source_frame(i).content_hash(), i))
        .collect();
    let raw = frame_hashes(&session.files().raw_video);
    assert_eq!(session.video_metadata().unwrap().total_frames, raw.len() as u64);
    raw.iter()
        .map(|hash| *by_hash.get(hash).expect("raw frame is a copy of a source frame"))
        .collect()
}

/// Timestamps near `fps` with a repeating, bounded jitter.
fn jittered(n: usize, fps: f64) -> Vec<f64> {
    (0..n)
        .map(|i| i as f64 / fps + ((i * 7) % 5) as f64 * 0.003)
        .collect()
}

// ── Grid selection ────────────────────────────────────────────────

#[test]
fn irregular_source_at_two_fps() {
    let timestamps = [0.0, 0.4, 0.9, 1.5];
    let plan = plan_cfr(&timestamps, FrameRate::new(2, 1)).unwrap();
    assert_eq!(plan.grid, vec![0.0, 0.5, 1.0, 1.5]);
    assert_eq!(plan.source_indices, vec![0, 1, 2, 3]);

    assert_eq!(transcoded_indices(FrameRate::new(2, 1), &timestamps), vec![0, 1, 2, 3]);
}

#[test]
fn matching_rate_is_identity() {
    let timestamps = cfr_timestamps(25, 10.0);
    let indices = transcoded_indices(FrameRate::new(10, 1), &timestamps);
    assert_eq!(indices, (0..25).collect::<Vec<_>>());
}

#[test]
fn jittered_source_follows_the_plan() {
    let timestamps = jittered(90, 24.0);
    let rate = FrameRate::FPS_30;
    let plan = plan_cfr(&timestamps, rate).unwrap();
    let duration = timestamps[timestamps.len() - 1];

    let indices = transcoded_indices(rate, &timestamps);
    assert_eq!(indices.len() as u64, last_grid_index(duration, rate) + 1);
    assert_eq!(indices, plan.source_indices);
    assert!(indices.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn ntsc_source_to_thirty() {
    let timestamps: Vec<f64> = (0..100).map(|i| i as f64 * 1001.0 / 30000.0).collect();
    let plan = plan_cfr(&timestamps, FrameRate::FPS_30).unwrap();
    assert!(matches!(plan.note, PlanNote::Resampled { .. }));

    let indices = transcoded_indices(FrameRate::FPS_30, &timestamps);
    assert_eq!(indices, plan.source_indices);
}

#[test]
fn slow_source_is_duplicated() {
    let timestamps = cfr_timestamps(6, 5.0);
    let indices = transcoded_indices(FrameRate::new(10, 1), &timestamps);
    assert_eq!(indices.len(), 11);
    for source in 0..6 {
        assert!(indices.contains(&source), "source frame {source} was dropped");
    }
}

#[test]
fn late_start_is_normalized() {
    let shifted: Vec<f64> = [0.0, 0.4, 0.9, 1.5].iter().map(|t| t + 7.25).collect();
    assert_eq!(transcoded_indices(FrameRate::new(2, 1), &shifted), vec![0, 1, 2, 3]);
}

// ── Geometry and failure ──────────────────────────────────────────

#[test]
fn larger_source_is_cropped_to_target() {
    let ws = Workspace::new(FrameRate::new(10, 1));
    let source = ws.dir.path().join("wide.rwio");
    let frames = (0..5).map(|i| {
        TimedFrame::new(
            FrameBuffer::filled(WIDTH * 3, HEIGHT * 2, Rgb(i as u8 * 40, 10, 10)),
            i as f64 / 10.0,
        )
    });
    RawCodec::write_timeline(&source, WIDTH * 3, HEIGHT * 2, frames).unwrap();

    let mut session = ws.manager.create("widescreen", &source, false).unwrap();
    ws.manager.transcode(&mut session, &ws.manager.controls()).unwrap();

    let meta = session.video_metadata().unwrap();
    assert_eq!((meta.width, meta.height, meta.total_frames), (WIDTH, HEIGHT, 5));
    let expected: Vec<u64> = (0..5)
        .map(|i| FrameBuffer::filled(WIDTH, HEIGHT, Rgb(i as u8 * 40, 10, 10)).content_hash())
        .collect();
    assert_eq!(frame_hashes(&session.files().raw_video), expected);
}

#[test]
fn empty_source_fails_without_output() {
    let ws = Workspace::new(FrameRate::FPS_30);
    let source = ws.dir.path().join("empty.rwio");
    write_source(&source, &[]);

    let mut session = ws.manager.create("nothing", &source, false).unwrap();
    let err = ws
        .manager
        .transcode(&mut session, &ws.manager.controls())
        .unwrap_err();

    assert!(matches!(err, RowioError::Decode(_)));
    assert_eq!(session.state(), SessionState::Error);
    assert!(session.video_metadata().is_none());
    assert!(!session.files().raw_video.exists());
    assert!(!staging_path(&session.files().raw_video).exists());
}
