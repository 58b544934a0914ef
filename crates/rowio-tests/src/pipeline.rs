//! Background runs and the event streams that follow them.

use crate::support::{cfr_timestamps, entries, rower_pose, scripted_detector, Workspace};
use parking_lot::Mutex;
use rowio_core::{FrameBuffer, FrameRate, ProgressCallback, Result, RowioError};
use rowio_pose::DetectedPose;
use rowio_session::{
    staging_path, EventHub, EventStream, PipelineEvent, PipelineRunner, RunOptions, SessionState,
    StreamItem,
};
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

// ── Helpers ───────────────────────────────────────────────────────

/// Drain a stream until the run reports `Finished`.
fn collect_until_finished(stream: &EventStream) -> Vec<PipelineEvent> {
    let mut events = Vec::new();
    loop {
        match stream.next_timeout(WAIT) {
            StreamItem::Event(event) => {
                let done = matches!(event, PipelineEvent::Finished { .. });
                events.push(event);
                if done {
                    return events;
                }
            }
            StreamItem::KeepAlive => panic!("no event within {WAIT:?}; got {events:?}"),
            StreamItem::Closed => return events,
        }
    }
}

fn progress_of<'a>(events: &'a [PipelineEvent], stage: &'a str) -> impl Iterator<Item = f64> + 'a {
    events.iter().filter_map(move |event| match event {
        PipelineEvent::Progress { stage: s, percent } if s == stage => Some(*percent),
        _ => None,
    })
}

// ── Runs ──────────────────────────────────────────────────────────

#[test]
fn run_streams_every_stage_in_order() {
    let ws = Workspace::new(FrameRate::new(10, 1));
    let source = ws.source(&cfr_timestamps(30, 10.0));
    let session = ws.manager.create("stream", &source, false).unwrap();

    let hub = EventHub::new();
    let stream = hub.subscribe("stream");
    let options = RunOptions {
        events: Some(hub.clone()),
        ..RunOptions::default()
    };
    let handle = PipelineRunner::spawn(
        Arc::clone(&ws.manager),
        session,
        Box::new(scripted_detector(vec![])),
        options,
    )
    .unwrap();

    let events = collect_until_finished(&stream);
    let outcome = handle.join().unwrap();
    assert!(outcome.is_complete());

    let states: Vec<SessionState> = events
        .iter()
        .filter_map(|event| match event {
            PipelineEvent::StateChanged { state } => Some(*state),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        vec![
            SessionState::Transcoded,
            SessionState::LandmarksExtracted,
            SessionState::Complete
        ]
    );

    for stage in ["transcode", "extract_landmarks", "annotate"] {
        let percents: Vec<f64> = progress_of(&events, stage).collect();
        assert_eq!(percents.first(), Some(&0.0), "{stage}");
        assert_eq!(percents.last(), Some(&100.0), "{stage}");
        assert!(percents.windows(2).all(|w| w[0] < w[1]), "{stage}: {percents:?}");
    }
    assert_eq!(
        events.last(),
        Some(&PipelineEvent::Finished {
            state: SessionState::Complete,
            message: None
        })
    );
}

#[test]
fn late_subscriber_sees_the_final_event() {
    let ws = Workspace::new(FrameRate::new(10, 1));
    let source = ws.source(&cfr_timestamps(5, 10.0));
    let session = ws.manager.create("latecomer", &source, false).unwrap();

    let hub = EventHub::new();
    let options = RunOptions {
        events: Some(hub.clone()),
        ..RunOptions::default()
    };
    PipelineRunner::spawn(
        Arc::clone(&ws.manager),
        session,
        Box::new(scripted_detector(vec![])),
        options,
    )
    .unwrap()
    .join()
    .unwrap();

    let stream = hub.subscribe("latecomer");
    assert_eq!(
        stream.next_timeout(WAIT),
        StreamItem::Event(PipelineEvent::Finished {
            state: SessionState::Complete,
            message: None
        })
    );
    assert_eq!(
        stream.next_timeout(ws.manager.settings().keepalive()),
        StreamItem::KeepAlive
    );
}

#[test]
fn resumed_run_skips_finished_stages() {
    let ws = Workspace::new(FrameRate::new(10, 1));
    let source = ws.source(&cfr_timestamps(10, 10.0));
    let mut session = ws.manager.create("resume", &source, false).unwrap();
    ws.manager.transcode(&mut session, &ws.manager.controls()).unwrap();
    let raw_before = std::fs::read(&session.files().raw_video).unwrap();

    let seen: Arc<Mutex<Vec<String>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let progress: ProgressCallback = Arc::new(move |stage: &str, _: f64| {
        let mut seen = sink.lock();
        if seen.last().map(String::as_str) != Some(stage) {
            seen.push(stage.to_string());
        }
    });
    let options = RunOptions {
        progress: Some(progress),
        ..RunOptions::default()
    };

    let reopened = ws.manager.open("resume").unwrap();
    let outcome = PipelineRunner::spawn(
        Arc::clone(&ws.manager),
        reopened,
        Box::new(scripted_detector(vec![])),
        options,
    )
    .unwrap()
    .join()
    .unwrap();

    assert!(outcome.is_complete());
    assert_eq!(*seen.lock(), vec!["extract_landmarks", "annotate"]);
    assert_eq!(std::fs::read(&outcome.session.files().raw_video).unwrap(), raw_before);
}

#[test]
fn failed_run_reports_the_error() {
    let ws = Workspace::new(FrameRate::new(10, 1));
    let source = ws.source(&cfr_timestamps(5, 10.0));
    let session = ws.manager.create("failing", &source, false).unwrap();

    let hub = EventHub::new();
    let stream = hub.subscribe("failing");
    let options = RunOptions {
        events: Some(hub.clone()),
        ..RunOptions::default()
    };
    let detector = |_: &FrameBuffer| -> Result<Option<DetectedPose>> {
        Err(RowioError::Detector("model missing".into()))
    };
    let handle =
        PipelineRunner::spawn(Arc::clone(&ws.manager), session, Box::new(detector), options).unwrap();

    let events = collect_until_finished(&stream);
    let outcome = handle.join().unwrap();

    assert_eq!(outcome.state, SessionState::Error);
    assert!(outcome.error.is_some());
    match events.last() {
        Some(PipelineEvent::Finished {
            state: SessionState::Error,
            message: Some(message),
        }) => assert!(message.contains("model missing"), "{message}"),
        other => panic!("unexpected final event {other:?}"),
    }
    assert!(!outcome.session.files().landmark_data.exists());
}

#[test]
fn cancel_during_extraction_keeps_the_raw_video() {
    let ws = Workspace::new(FrameRate::new(10, 1));
    let source = ws.source(&cfr_timestamps(20, 10.0));
    let session = ws.manager.create("interrupted", &source, false).unwrap();
    let files = session.files().clone();

    let hub = EventHub::new();
    let stream = hub.subscribe("interrupted");
    let options = RunOptions {
        events: Some(hub.clone()),
        ..RunOptions::default()
    };

    // The third detector call parks until the run has been cancelled.
    let (parked_tx, parked_rx) = crossbeam_channel::bounded::<()>(1);
    let (resume_tx, resume_rx) = crossbeam_channel::bounded::<()>(0);
    let mut calls = 0;
    let detector = move |_: &FrameBuffer| -> Result<Option<DetectedPose>> {
        calls += 1;
        if calls == 3 {
            let _ = parked_tx.try_send(());
            let _ = resume_rx.recv();
        }
        Ok(Some(rower_pose()))
    };
    let handle =
        PipelineRunner::spawn(Arc::clone(&ws.manager), session, Box::new(detector), options).unwrap();

    parked_rx.recv_timeout(WAIT).expect("extraction never reached the third frame");
    assert!(files.raw_video.is_file());
    handle.cancel();
    drop(resume_tx);

    let events = collect_until_finished(&stream);
    let outcome = handle.join().unwrap();

    assert_eq!(outcome.state, SessionState::Cancelled);
    assert_eq!(outcome.session.state(), SessionState::Cancelled);
    assert!(outcome.error.is_none());
    assert_eq!(
        events.last(),
        Some(&PipelineEvent::Finished {
            state: SessionState::Cancelled,
            message: None
        })
    );
    assert!(!events.iter().any(|event| matches!(
        event,
        PipelineEvent::StateChanged {
            state: SessionState::LandmarksExtracted
        }
    )));

    assert!(files.raw_video.is_file());
    assert!(!files.landmark_data.exists());
    assert!(!files.annotated_video.exists());
    assert!(!staging_path(&files.landmark_data).exists());
    assert_eq!(
        entries(outcome.session.directory()),
        vec!["raw.mp4", "session_config.json"]
    );
    assert_eq!(
        ws.manager.open("interrupted").unwrap().state(),
        SessionState::Transcoded
    );
}
