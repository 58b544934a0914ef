//! Subcommand handlers.

use anyhow::{bail, Context, Result};
use rowio_core::RowioError;
use rowio_media::{FfmpegCodec, FfmpegTools};
use rowio_pose::{DetectorCommand, ProcessDetector};
use rowio_render::SoftwarePainter;
use rowio_session::{
    EventHub, PipelineEvent, PipelineRunner, PipelineSettings, RunOptions, Session,
    SessionManager, SessionState, StreamItem,
};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

fn manager(settings: PipelineSettings, codec: FfmpegCodec) -> Result<SessionManager> {
    Ok(SessionManager::new(
        settings,
        Arc::new(codec),
        Arc::new(SoftwarePainter::new()),
    )?)
}

/// Tools resolved on `PATH` at spawn time; enough for commands that never
/// touch video.
fn lazy_codec() -> FfmpegCodec {
    FfmpegCodec::new(FfmpegTools::new("ffmpeg", "ffprobe"))
}

pub fn create(settings: PipelineSettings, title: &str, video: &Path, overwrite: bool) -> Result<()> {
    let manager = manager(settings, lazy_codec())?;
    let session = manager.create(title, video, overwrite)?;
    println!("created {} at {}", session.title(), session.directory().display());
    Ok(())
}

pub fn run(
    settings: PipelineSettings,
    title: &str,
    video: &Path,
    detector: &str,
    overwrite: bool,
    timeout: Option<Duration>,
) -> Result<()> {
    let codec = FfmpegCodec::discover().context("locating ffmpeg")?;
    let keepalive = settings.keepalive();
    let manager = Arc::new(manager(settings, codec)?);

    let session = match manager.create(title, video, overwrite) {
        Ok(session) => session,
        Err(RowioError::AlreadyExists(_)) => {
            let session = manager.open(title)?;
            if session.source() != video.canonicalize()?.as_path() {
                warn!(
                    session = %title,
                    source = %session.source().display(),
                    "existing session was created from a different video"
                );
            }
            info!(session = %title, state = %session.state(), "resuming session");
            session
        }
        Err(e) => return Err(e.into()),
    };

    let command = DetectorCommand::parse(detector)?;
    let detector = ProcessDetector::spawn(&command, session.detector_preferences())?;

    let hub = EventHub::new();
    let stream = hub.subscribe(title);
    let options = RunOptions {
        overwrite,
        events: Some(hub),
        progress: None,
    };
    let handle = PipelineRunner::spawn(Arc::clone(&manager), session, Box::new(detector), options)?;

    let mut deadline = timeout.map(|t| Instant::now() + t);
    loop {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            warn!(session = %title, "timeout reached, cancelling pipeline");
            handle.cancel();
            deadline = None;
        }
        match stream.next_timeout(next_wait(keepalive, deadline, Instant::now())) {
            StreamItem::Event(PipelineEvent::Progress { stage, percent }) => {
                println!("{stage}: {percent:>3.0}%");
            }
            StreamItem::Event(PipelineEvent::StateChanged { state }) => {
                println!("state: {state}");
            }
            StreamItem::Event(PipelineEvent::Finished { .. }) | StreamItem::Closed => break,
            StreamItem::KeepAlive => {
                debug!(session = %title, "pipeline still running");
                if handle.is_finished() {
                    break;
                }
            }
        }
    }

    let outcome = handle.join()?;
    match outcome.state {
        SessionState::Complete => {
            println!(
                "done: {}",
                outcome.session.files().annotated_video.display()
            );
            Ok(())
        }
        SessionState::Cancelled => {
            println!("cancelled");
            Ok(())
        }
        _ => match outcome.error {
            Some(e) => Err(e).context(format!("pipeline for {title} failed")),
            None => bail!("pipeline for {title} ended in state {}", outcome.state),
        },
    }
}

/// How long to wait for the next event: the keepalive interval, cut short
/// by a pending deadline.
fn next_wait(keepalive: Duration, deadline: Option<Instant>, now: Instant) -> Duration {
    match deadline {
        Some(d) => keepalive.min(d.saturating_duration_since(now)),
        None => keepalive,
    }
}

pub fn show(settings: PipelineSettings, title: &str) -> Result<()> {
    let manager = manager(settings, lazy_codec())?;
    let session = manager.open(title)?;
    print_session(&session);
    Ok(())
}

pub fn delete(settings: PipelineSettings, title: &str) -> Result<()> {
    let manager = manager(settings, lazy_codec())?;
    let session = manager.open(title)?;
    manager
        .delete(&session)
        .with_context(|| format!("deleting {}", session.directory().display()))?;
    println!("deleted {title}");
    Ok(())
}

fn print_session(session: &Session) {
    println!("title:     {}", session.title());
    println!("state:     {}", session.state());
    println!("directory: {}", session.directory().display());
    println!("source:    {}", session.source().display());
    if let Some(meta) = session.video_metadata() {
        println!(
            "video:     {}x{} @ {:.3} fps, {} frames",
            meta.width, meta.height, meta.fps, meta.total_frames
        );
    }
    for path in session.files().artifacts() {
        let mark = if path.is_file() { "x" } else { " " };
        println!("  [{mark}] {}", path.display());
    }
}
