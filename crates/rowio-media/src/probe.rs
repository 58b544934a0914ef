//! Container probing through `ffprobe`.

use rowio_core::{Result, RowioError, VideoMetadata};
use serde::Deserialize;
use std::path::Path;
use std::process::Command;

use crate::tools::FfmpegTools;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Read stream metadata for the first video stream of `path`.
pub fn probe_video(tools: &FfmpegTools, path: &Path) -> Result<VideoMetadata> {
    if !path.is_file() {
        return Err(RowioError::Decode(format!(
            "cannot open {}: no such file",
            path.display()
        )));
    }

    let output = Command::new(tools.ffprobe())
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path)
        .output()
        .map_err(|e| RowioError::Decode(format!("failed to run ffprobe: {e}")))?;

    if !output.status.success() {
        return Err(RowioError::Decode(format!(
            "ffprobe failed on {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    parse_probe_json(&String::from_utf8_lossy(&output.stdout))
}

/// Interpret `ffprobe -print_format json -show_streams -show_format` output.
pub fn parse_probe_json(json: &str) -> Result<VideoMetadata> {
    let output: ProbeOutput = serde_json::from_str(json)
        .map_err(|e| RowioError::Decode(format!("unreadable ffprobe output: {e}")))?;

    let stream = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| RowioError::Decode("no video stream".into()))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(RowioError::Decode("video stream has no dimensions".into())),
    };

    let fps = [&stream.avg_frame_rate, &stream.r_frame_rate]
        .into_iter()
        .filter_map(|r| r.as_deref().and_then(parse_rate))
        .next()
        .ok_or_else(|| RowioError::Decode("video stream has no frame rate".into()))?;

    let duration = stream
        .duration
        .as_deref()
        .or(output.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|d| d.parse::<f64>().ok());

    let total_frames = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<u64>().ok())
        .or_else(|| duration.map(|d| (d * fps).round().max(0.0) as u64))
        .unwrap_or(0);

    Ok(VideoMetadata {
        fps,
        total_frames,
        width,
        height,
    })
}

/// Parse `"30000/1001"` or `"25"`. Zero rates are rejected.
fn parse_rate(rate: &str) -> Option<f64> {
    let fps = match rate.split_once('/') {
        Some((n, d)) => {
            let n: f64 = n.trim().parse().ok()?;
            let d: f64 = d.trim().parse().ok()?;
            if d == 0.0 {
                return None;
            }
            n / d
        }
        None => rate.trim().parse().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}
