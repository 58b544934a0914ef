//! End-to-end session scenarios: create, full pipeline, gaps in landmark
//! data and cancellation part way through a stage.

use crate::support::{cfr_timestamps, entries, frame_hashes, scripted_detector, Workspace};
use rowio_core::{CancellationToken, FrameBuffer, FrameRate, Result, RowioError};
use rowio_pose::{DetectedPose, LandmarkTable};
use rowio_session::{staging_path, SessionState};
use std::fs;

// ── Create ────────────────────────────────────────────────────────

#[test]
fn create_leaves_only_the_config() {
    let ws = Workspace::new(FrameRate::FPS_30);
    let source = ws.source(&cfr_timestamps(10, 30.0));

    let session = ws.manager.create("sample", &source, false).unwrap();

    assert_eq!(session.state(), SessionState::DirectoryCreated);
    assert_eq!(session.directory(), ws.dir.path().join("sessions").join("sample"));
    assert_eq!(entries(session.directory()), vec!["session_config.json"]);

    let config: serde_json::Value =
        serde_json::from_slice(&fs::read(&session.files().session_config).unwrap()).unwrap();
    assert_eq!(config["title"], "sample");
    assert_eq!(config["version"], 1);
    assert!(config["video_metadata"].is_null());
}

#[test]
fn create_twice_needs_overwrite() {
    let ws = Workspace::new(FrameRate::FPS_30);
    let source = ws.source(&cfr_timestamps(10, 30.0));
    ws.manager.create("sample", &source, false).unwrap();

    let err = ws.manager.create("sample", &source, false).unwrap_err();
    assert!(matches!(err, RowioError::AlreadyExists(_)));

    let session = ws.manager.create("sample", &source, true).unwrap();
    assert_eq!(session.state(), SessionState::DirectoryCreated);
}

#[test]
fn create_rejects_bad_titles_without_touching_disk() {
    let ws = Workspace::new(FrameRate::FPS_30);
    let source = ws.source(&cfr_timestamps(3, 30.0));

    let long = "x".repeat(33);
    for title in ["abc", "has space", "../escape", long.as_str()] {
        let err = ws.manager.create(title, &source, false).unwrap_err();
        assert!(matches!(err, RowioError::Validation(_)), "{title}");
    }
    assert!(!ws.dir.path().join("sessions").exists());
}

// ── Full pipeline ─────────────────────────────────────────────────

#[test]
fn full_pipeline_produces_every_artifact() {
    let ws = Workspace::new(FrameRate::FPS_30);
    let source = ws.source(&cfr_timestamps(45, 30.0));
    let mut session = ws.manager.create("sample", &source, false).unwrap();
    let controls = ws.manager.controls();

    ws.manager.transcode(&mut session, &controls).unwrap();
    assert_eq!(session.state(), SessionState::Transcoded);
    let meta = *session.video_metadata().unwrap();
    assert_eq!(meta.total_frames, 45);
    assert_eq!((meta.width, meta.height), (32, 24));
    assert!((meta.fps - 30.0).abs() < 1e-9);

    let mut detector = scripted_detector(vec![]);
    ws.manager
        .extract_landmarks(&mut session, &mut detector, &controls)
        .unwrap();
    assert_eq!(session.state(), SessionState::LandmarksExtracted);

    ws.manager.annotate(&mut session, &controls).unwrap();
    assert_eq!(session.state(), SessionState::Complete);

    let files = session.files();
    for path in files.artifacts() {
        assert!(path.is_file(), "{} missing", path.display());
    }
    assert_eq!(frame_hashes(&files.annotated_video).len(), 45);

    let table = LandmarkTable::load(&files.landmark_data, meta.width, meta.height).unwrap();
    assert_eq!(table.len(), 45);
    assert!(table.contains(1) && table.contains(45));
    assert!(!table.contains(0));
}

// ── Missing landmarks ─────────────────────────────────────────────

#[test]
fn frame_without_landmarks_passes_through_unchanged() {
    let ws = Workspace::new(FrameRate::FPS_30);
    let source = ws.source(&cfr_timestamps(300, 30.0));
    let mut session = ws.manager.create("sample", &source, false).unwrap();
    let controls = ws.manager.controls();

    ws.manager.transcode(&mut session, &controls).unwrap();
    let mut detector = scripted_detector(vec![37]);
    ws.manager
        .extract_landmarks(&mut session, &mut detector, &controls)
        .unwrap();

    let meta = *session.video_metadata().unwrap();
    let table = LandmarkTable::load(&session.files().landmark_data, meta.width, meta.height).unwrap();
    assert_eq!(table.len(), 299);
    assert!(!table.contains(37));

    ws.manager.annotate(&mut session, &controls).unwrap();

    let raw = frame_hashes(&session.files().raw_video);
    let annotated = frame_hashes(&session.files().annotated_video);
    assert_eq!(raw.len(), 300);
    assert_eq!(annotated.len(), 300);
    // Frame numbers are 1-based; vector positions are not.
    assert_eq!(annotated[36], raw[36]);
    assert_ne!(annotated[35], raw[35]);
    assert_ne!(annotated[37], raw[37]);
}

#[test]
fn empty_landmark_table_copies_the_raw_video() {
    let ws = Workspace::new(FrameRate::new(10, 1));
    let source = ws.source(&cfr_timestamps(8, 10.0));
    let mut session = ws.manager.create("sample", &source, false).unwrap();
    let controls = ws.manager.controls();

    ws.manager.transcode(&mut session, &controls).unwrap();
    let mut blind = |_: &FrameBuffer| -> Result<Option<DetectedPose>> { Ok(None) };
    ws.manager
        .extract_landmarks(&mut session, &mut blind, &controls)
        .unwrap();
    ws.manager.annotate(&mut session, &controls).unwrap();

    assert_eq!(
        frame_hashes(&session.files().annotated_video),
        frame_hashes(&session.files().raw_video)
    );
}

// ── Cancellation ──────────────────────────────────────────────────

#[test]
fn cancelled_extraction_leaves_a_recoverable_session() {
    let ws = Workspace::new(FrameRate::FPS_30);
    let source = ws.source(&cfr_timestamps(60, 30.0));
    let mut session = ws.manager.create("sample", &source, false).unwrap();
    ws.manager.transcode(&mut session, &ws.manager.controls()).unwrap();

    let files = session.files().clone();
    let raw_before = fs::read(&files.raw_video).unwrap();

    let token = CancellationToken::new();
    let trigger = token.clone();
    let mut inner = scripted_detector(vec![]);
    let mut calls = 0;
    let mut detector = |frame: &FrameBuffer| {
        calls += 1;
        if calls == 20 {
            trigger.cancel();
        }
        inner(frame)
    };
    let controls = ws.manager.controls().with_cancel(token);

    let err = ws
        .manager
        .extract_landmarks(&mut session, &mut detector, &controls)
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(calls, 20);
    assert_eq!(session.state(), SessionState::Cancelled);

    assert_eq!(fs::read(&files.raw_video).unwrap(), raw_before);
    assert!(!files.landmark_data.exists());
    assert!(!staging_path(&files.landmark_data).exists());
    assert_eq!(entries(session.directory()), vec!["raw.mp4", "session_config.json"]);

    let reloaded = ws.manager.load(session.directory()).unwrap();
    assert_eq!(reloaded.state(), SessionState::Transcoded);
    assert_eq!(reloaded.video_metadata(), session.video_metadata());

    ws.manager.delete(&reloaded).unwrap();
    assert!(!files.raw_video.exists());
    assert!(!session.directory().exists());
}

#[test]
fn extraction_can_be_retried_after_cancel() {
    let ws = Workspace::new(FrameRate::new(10, 1));
    let source = ws.source(&cfr_timestamps(12, 10.0));
    let mut session = ws.manager.create("sample", &source, false).unwrap();
    ws.manager.transcode(&mut session, &ws.manager.controls()).unwrap();

    let token = CancellationToken::new();
    token.cancel();
    let mut detector = scripted_detector(vec![]);
    let err = ws
        .manager
        .extract_landmarks(&mut session, &mut detector, &ws.manager.controls().with_cancel(token))
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(session.state(), SessionState::Cancelled);

    let mut detector = scripted_detector(vec![]);
    ws.manager
        .extract_landmarks(&mut session, &mut detector, &ws.manager.controls())
        .unwrap();
    assert_eq!(session.state(), SessionState::LandmarksExtracted);
    assert!(session.files().landmark_data.is_file());
}
