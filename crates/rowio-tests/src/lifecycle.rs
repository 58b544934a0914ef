//! Stage ordering, overwrite rules, failure handling and directory
//! integrity across the session manager.

use crate::support::{cfr_timestamps, entries, frame_hashes, scripted_detector, Workspace};
use parking_lot::Mutex;
use rowio_core::{CancellationToken, FrameBuffer, FrameRate, Result, RowioError};
use rowio_pose::DetectedPose;
use rowio_session::{staging_path, Session, SessionState};
use std::fs;
use std::sync::Arc;

// ── Helpers ───────────────────────────────────────────────────────

fn completed(ws: &Workspace, title: &str, frames: usize) -> Session {
    let source = ws.source(&cfr_timestamps(frames, 10.0));
    let mut session = ws.manager.create(title, &source, false).unwrap();
    let controls = ws.manager.controls();
    ws.manager.transcode(&mut session, &controls).unwrap();
    let mut detector = scripted_detector(vec![]);
    ws.manager
        .extract_landmarks(&mut session, &mut detector, &controls)
        .unwrap();
    ws.manager.annotate(&mut session, &controls).unwrap();
    session
}

// ── Ordering ──────────────────────────────────────────────────────

#[test]
fn stages_refuse_to_run_out_of_order() {
    let ws = Workspace::new(FrameRate::new(10, 1));
    let source = ws.source(&cfr_timestamps(5, 10.0));
    let mut session = ws.manager.create("ordering", &source, false).unwrap();
    let controls = ws.manager.controls();

    let mut detector = scripted_detector(vec![]);
    let err = ws
        .manager
        .extract_landmarks(&mut session, &mut detector, &controls)
        .unwrap_err();
    assert!(matches!(err, RowioError::Validation(_)));
    assert_eq!(session.state(), SessionState::DirectoryCreated);

    let err = ws.manager.annotate(&mut session, &controls).unwrap_err();
    assert!(matches!(err, RowioError::Validation(_)));
    assert_eq!(session.state(), SessionState::DirectoryCreated);
    assert_eq!(entries(session.directory()), vec!["session_config.json"]);
}

#[test]
fn annotate_needs_landmark_data() {
    let ws = Workspace::new(FrameRate::new(10, 1));
    let mut session = completed(&ws, "missing", 5);
    fs::remove_file(&session.files().landmark_data).unwrap();

    let err = ws
        .manager
        .annotate(&mut session, &ws.manager.controls().with_overwrite(true))
        .unwrap_err();
    assert!(matches!(err, RowioError::Validation(_)));
    assert!(session.files().annotated_video.is_file());
}

// ── Overwrite ─────────────────────────────────────────────────────

#[test]
fn annotate_again_requires_overwrite() {
    let ws = Workspace::new(FrameRate::new(10, 1));
    let mut session = completed(&ws, "again", 6);
    let before = fs::read(&session.files().annotated_video).unwrap();

    let err = ws
        .manager
        .annotate(&mut session, &ws.manager.controls())
        .unwrap_err();
    assert!(matches!(err, RowioError::AlreadyExists(_)));
    assert_eq!(session.state(), SessionState::Complete);
    assert_eq!(fs::read(&session.files().annotated_video).unwrap(), before);

    ws.manager
        .annotate(&mut session, &ws.manager.controls().with_overwrite(true))
        .unwrap();
    assert_eq!(session.state(), SessionState::Complete);
    assert_eq!(fs::read(&session.files().annotated_video).unwrap(), before);
}

#[test]
fn transcode_overwrite_replaces_raw_video() {
    let ws = Workspace::new(FrameRate::new(10, 1));
    let mut session = completed(&ws, "redo", 4);

    let err = ws
        .manager
        .transcode(&mut session, &ws.manager.controls())
        .unwrap_err();
    assert!(matches!(err, RowioError::AlreadyExists(_)));

    ws.manager
        .transcode(&mut session, &ws.manager.controls().with_overwrite(true))
        .unwrap();
    assert_eq!(session.state(), SessionState::Transcoded);
    assert_eq!(frame_hashes(&session.files().raw_video).len(), 4);
    assert!(!session.files().landmark_data.exists());
    assert!(!session.files().annotated_video.exists());
    assert_eq!(
        ws.manager.open("redo").unwrap().state(),
        SessionState::Transcoded
    );
}

#[test]
fn create_overwrite_clears_a_finished_session() {
    let ws = Workspace::new(FrameRate::new(10, 1));
    let session = completed(&ws, "fresh", 4);
    let source = session.source().to_path_buf();

    let replaced = ws.manager.create("fresh", &source, true).unwrap();
    assert_eq!(replaced.directory(), session.directory());
    assert_eq!(entries(replaced.directory()), vec!["session_config.json"]);
}

// ── Failures ──────────────────────────────────────────────────────

#[test]
fn detector_failure_marks_session_as_error() {
    let ws = Workspace::new(FrameRate::new(10, 1));
    let source = ws.source(&cfr_timestamps(10, 10.0));
    let mut session = ws.manager.create("broken", &source, false).unwrap();
    ws.manager.transcode(&mut session, &ws.manager.controls()).unwrap();

    let mut calls = 0;
    let mut detector = |_: &FrameBuffer| -> Result<Option<DetectedPose>> {
        calls += 1;
        if calls == 4 {
            return Err(RowioError::Detector("model crashed".into()));
        }
        Ok(None)
    };
    let err = ws
        .manager
        .extract_landmarks(&mut session, &mut detector, &ws.manager.controls())
        .unwrap_err();

    assert!(matches!(err, RowioError::Detector(_)));
    assert_eq!(session.state(), SessionState::Error);
    assert!(!session.files().landmark_data.exists());
    assert!(!staging_path(&session.files().landmark_data).exists());
    assert_eq!(
        ws.manager.load(session.directory()).unwrap().state(),
        SessionState::Transcoded
    );
}

#[test]
fn cancelled_transcode_keeps_config_intact() {
    let ws = Workspace::new(FrameRate::new(10, 1));
    let source = ws.source(&cfr_timestamps(50, 10.0));
    let mut session = ws.manager.create("halfway", &source, false).unwrap();
    let config_before = fs::read(&session.files().session_config).unwrap();

    let token = CancellationToken::new();
    let trigger = token.clone();
    let controls = ws
        .manager
        .controls()
        .with_cancel(token)
        .with_progress(Arc::new(move |_: &str, percent: f64| {
            if percent >= 40.0 {
                trigger.cancel();
            }
        }));

    let err = ws.manager.transcode(&mut session, &controls).unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(session.state(), SessionState::Cancelled);
    assert!(session.video_metadata().is_none());
    assert_eq!(entries(session.directory()), vec!["session_config.json"]);
    assert_eq!(fs::read(&session.files().session_config).unwrap(), config_before);
}

#[test]
fn cancelled_annotation_keeps_earlier_outputs() {
    let ws = Workspace::new(FrameRate::new(10, 1));
    let source = ws.source(&cfr_timestamps(40, 10.0));
    let mut session = ws.manager.create("paused", &source, false).unwrap();
    let controls = ws.manager.controls();
    ws.manager.transcode(&mut session, &controls).unwrap();
    let mut detector = scripted_detector(vec![]);
    ws.manager
        .extract_landmarks(&mut session, &mut detector, &controls)
        .unwrap();
    let raw_before = fs::read(&session.files().raw_video).unwrap();
    let landmarks_before = fs::read(&session.files().landmark_data).unwrap();

    let token = CancellationToken::new();
    let trigger = token.clone();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let controls = ws
        .manager
        .controls()
        .with_cancel(token)
        .with_progress(Arc::new(move |_: &str, percent: f64| {
            sink.lock().push(percent);
            if percent >= 40.0 {
                trigger.cancel();
            }
        }));

    let err = ws.manager.annotate(&mut session, &controls).unwrap_err();
    assert!(err.is_cancelled());
    assert!(seen.lock().iter().any(|&p| p > 0.0 && p < 100.0));
    assert!(!seen.lock().contains(&100.0));

    assert_eq!(session.state(), SessionState::Cancelled);
    let files = session.files();
    assert!(!files.annotated_video.exists());
    assert!(!staging_path(&files.annotated_video).exists());
    assert_eq!(fs::read(&files.raw_video).unwrap(), raw_before);
    assert_eq!(fs::read(&files.landmark_data).unwrap(), landmarks_before);
    assert_eq!(
        entries(session.directory()),
        vec!["landmarks.json", "raw.mp4", "session_config.json"]
    );
    assert_eq!(
        ws.manager.load(session.directory()).unwrap().state(),
        SessionState::LandmarksExtracted
    );
}

#[test]
fn panicking_progress_callback_does_not_stop_the_stage() {
    let ws = Workspace::new(FrameRate::new(10, 1));
    let source = ws.source(&cfr_timestamps(20, 10.0));
    let mut session = ws.manager.create("noisy", &source, false).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let controls = ws
        .manager
        .controls()
        .with_progress(Arc::new(move |_: &str, percent: f64| {
            sink.lock().push(percent);
            panic!("progress sink exploded");
        }));

    ws.manager.transcode(&mut session, &controls).unwrap();

    assert_eq!(session.state(), SessionState::Transcoded);
    let seen = seen.lock();
    assert_eq!(seen.first(), Some(&0.0));
    assert_eq!(seen.last(), Some(&100.0));
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
}

// ── Load and delete ───────────────────────────────────────────────

#[test]
fn load_derives_state_from_artifacts() {
    let ws = Workspace::new(FrameRate::new(10, 1));
    let session = completed(&ws, "reload", 5);
    let dir = session.directory().to_path_buf();

    assert_eq!(ws.manager.load(&dir).unwrap().state(), SessionState::Complete);

    fs::remove_file(&session.files().annotated_video).unwrap();
    assert_eq!(
        ws.manager.load(&dir).unwrap().state(),
        SessionState::LandmarksExtracted
    );

    fs::remove_file(&session.files().landmark_data).unwrap();
    let reloaded = ws.manager.open("reload").unwrap();
    assert_eq!(reloaded.state(), SessionState::Transcoded);
    assert_eq!(reloaded.video_metadata().unwrap().total_frames, 5);
    assert_eq!(reloaded.files(), session.files());
}

#[test]
fn load_of_missing_session_is_not_found() {
    let ws = Workspace::new(FrameRate::new(10, 1));
    let err = ws.manager.open("ghost").unwrap_err();
    assert!(matches!(err, RowioError::NotFound(_)));
}

#[test]
fn moved_session_directory_still_loads() {
    let ws = Workspace::new(FrameRate::new(10, 1));
    let session = completed(&ws, "mover", 3);
    let moved = ws.dir.path().join("elsewhere");
    fs::rename(session.directory(), &moved).unwrap();

    let reloaded = ws.manager.load(&moved).unwrap();
    assert_eq!(reloaded.state(), SessionState::Complete);
    assert_eq!(reloaded.directory(), moved);
    assert!(reloaded.files().raw_video.starts_with(&moved));
}

#[test]
fn delete_refuses_foreign_files() {
    let ws = Workspace::new(FrameRate::new(10, 1));
    let session = completed(&ws, "guarded", 3);
    let stray = session.directory().join("notes.txt");
    fs::write(&stray, "keep me").unwrap();
    let before = entries(session.directory());

    let err = ws.manager.delete(&session).unwrap_err();
    assert!(matches!(err, RowioError::Integrity(_)));
    assert_eq!(entries(session.directory()), before);

    fs::remove_file(&stray).unwrap();
    ws.manager.delete(&session).unwrap();
    assert!(!session.directory().exists());
}

#[test]
fn delete_allows_leftover_staging_files() {
    let ws = Workspace::new(FrameRate::new(10, 1));
    let session = completed(&ws, "leftover", 3);
    fs::write(staging_path(&session.files().landmark_data), b"{").unwrap();

    ws.manager.delete(&session).unwrap();
    assert!(!session.directory().exists());
}
