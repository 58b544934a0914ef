//! RowIO Media - video I/O for the pose pipeline
//!
//! This crate handles:
//! - Locating the FFmpeg command-line tools
//! - Probing containers with ffprobe
//! - Decoding to RGB24 frames with per-frame timestamps
//! - Encoding fixed-rate frames to H.264
//! - A lossless raw container that needs no external tools

pub mod decoder;
pub mod encoder;
pub mod ffmpeg;
pub mod probe;
pub mod raw;
pub mod tools;

pub use decoder::FfmpegTimeline;
pub use encoder::{EncoderConfig, FfmpegWriter};
pub use ffmpeg::FfmpegCodec;
pub use probe::{parse_probe_json, probe_video};
pub use raw::RawCodec;
pub use tools::FfmpegTools;
