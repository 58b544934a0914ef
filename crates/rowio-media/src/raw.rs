//! Lossless raw video container.
//!
//! Layout, all integers little-endian:
//!
//! ```text
//! "RWIO" | version: u8 | width: u32 | height: u32 | fps_num: u32 | fps_den: u32
//! then per frame: pts_seconds: f64 | width * height * 3 RGB bytes
//! ```
//!
//! `fps_num == 0` marks a variable-rate file. Every record carries its own
//! timestamp, so irregular sources round-trip exactly. Frames are stored
//! uncompressed, which makes byte-identity checks on decoded output
//! meaningful.

use rowio_core::{
    DecodeOptions, EncodeSettings, FrameBuffer, FrameRate, FrameTimeline, FrameWriter, Result,
    RowioError, TimedFrame, VideoCodec, VideoMetadata,
};
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

const MAGIC: &[u8; 4] = b"RWIO";
const VERSION: u8 = 1;
const HEADER_LEN: u64 = 4 + 1 + 4 * 4;
const PTS_LEN: u64 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RawHeader {
    width: u32,
    height: u32,
    rate: Option<FrameRate>,
}

impl RawHeader {
    fn record_len(&self) -> u64 {
        PTS_LEN + FrameBuffer::byte_len(self.width, self.height) as u64
    }

    fn write_to(&self, out: &mut impl Write) -> std::io::Result<()> {
        let (num, den) = self
            .rate
            .map(|r| (r.numerator, r.denominator))
            .unwrap_or((0, 0));
        out.write_all(MAGIC)?;
        out.write_all(&[VERSION])?;
        for v in [self.width, self.height, num, den] {
            out.write_all(&v.to_le_bytes())?;
        }
        Ok(())
    }

    fn read_from(input: &mut impl Read) -> Result<Self> {
        let mut buf = [0u8; HEADER_LEN as usize];
        input
            .read_exact(&mut buf)
            .map_err(|e| RowioError::Decode(format!("raw header unreadable: {e}")))?;
        if &buf[0..4] != MAGIC {
            return Err(RowioError::Decode("not a raw RWIO video".into()));
        }
        if buf[4] != VERSION {
            return Err(RowioError::Decode(format!(
                "unsupported raw video version {}",
                buf[4]
            )));
        }
        let field = |i: usize| {
            let at = 5 + i * 4;
            u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
        };
        let (width, height, num, den) = (field(0), field(1), field(2), field(3));
        if width == 0 || height == 0 {
            return Err(RowioError::Decode("raw video has no video stream".into()));
        }
        let rate = (num > 0 && den > 0).then(|| FrameRate::new(num, den));
        Ok(Self {
            width,
            height,
            rate,
        })
    }
}

fn open_file(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| RowioError::Decode(format!("cannot open {}: {e}", path.display())))
}

/// Codec backed by the raw container. Needs no external tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl RawCodec {
    pub fn new() -> Self {
        Self
    }

    /// Write frames with explicit, possibly irregular, timestamps.
    pub fn write_timeline<I>(path: &Path, width: u32, height: u32, frames: I) -> Result<u64>
    where
        I: IntoIterator<Item = TimedFrame>,
    {
        let header = RawHeader {
            width,
            height,
            rate: None,
        };
        let mut out = BufWriter::new(File::create(path)?);
        header.write_to(&mut out)?;
        let mut count = 0;
        for timed in frames {
            if timed.frame.dimensions() != (width, height) {
                return Err(RowioError::Encode(format!(
                    "frame {count} is {}x{}, container is {width}x{height}",
                    timed.frame.width, timed.frame.height
                )));
            }
            out.write_all(&timed.pts.to_le_bytes())?;
            out.write_all(timed.frame.as_bytes())?;
            count += 1;
        }
        out.flush()?;
        Ok(count)
    }
}

impl VideoCodec for RawCodec {
    fn name(&self) -> &str {
        "raw"
    }

    fn probe(&self, path: &Path) -> Result<VideoMetadata> {
        let mut file = open_file(path)?;
        let header = RawHeader::read_from(&mut file)?;
        let len = file.metadata()?.len();
        let total_frames = len.saturating_sub(HEADER_LEN) / header.record_len();

        let fps = match header.rate {
            Some(rate) => rate.to_fps_f64(),
            None if total_frames > 1 => {
                file.seek(SeekFrom::Start(
                    HEADER_LEN + (total_frames - 1) * header.record_len(),
                ))?;
                let mut pts = [0u8; PTS_LEN as usize];
                file.read_exact(&mut pts)?;
                let last = f64::from_le_bytes(pts);
                if last > 0.0 {
                    (total_frames - 1) as f64 / last
                } else {
                    0.0
                }
            }
            None => 0.0,
        };

        Ok(VideoMetadata {
            fps,
            total_frames,
            width: header.width,
            height: header.height,
        })
    }

    fn open(&self, path: &Path, options: &DecodeOptions) -> Result<Box<dyn FrameTimeline>> {
        let total = self.probe(path)?.total_frames;
        let mut reader = BufReader::new(open_file(path)?);
        let header = RawHeader::read_from(&mut reader)?;
        Ok(Box::new(RawTimeline {
            reader,
            header,
            target: options.target_size,
            total,
            index: 0,
            done: false,
        }))
    }

    fn create(&self, path: &Path, settings: &EncodeSettings) -> Result<Box<dyn FrameWriter>> {
        if settings.width == 0 || settings.height == 0 {
            return Err(RowioError::Validation(format!(
                "encode size {}x{} must be positive",
                settings.width, settings.height
            )));
        }
        let header = RawHeader {
            width: settings.width,
            height: settings.height,
            rate: Some(settings.frame_rate.validate()?),
        };
        let mut out = BufWriter::new(File::create(path)?);
        header
            .write_to(&mut out)
            .map_err(|e| RowioError::Encode(format!("writing raw header: {e}")))?;
        Ok(Box::new(RawWriter {
            out: Some(out),
            settings: *settings,
            written: 0,
        }))
    }
}

/// Decode pass over a raw container.
struct RawTimeline {
    reader: BufReader<File>,
    header: RawHeader,
    target: Option<(u32, u32)>,
    total: u64,
    index: u64,
    done: bool,
}

impl RawTimeline {
    fn read_record(&mut self) -> Result<Option<TimedFrame>> {
        let mut pts = [0u8; PTS_LEN as usize];
        match self.reader.read_exact(&mut pts) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof && self.index >= self.total => {
                return Ok(None)
            }
            Err(e) => {
                return Err(RowioError::Decode(format!(
                    "raw record {} unreadable: {e}",
                    self.index
                )))
            }
        }
        let mut data = vec![0u8; FrameBuffer::byte_len(self.header.width, self.header.height)];
        self.reader.read_exact(&mut data).map_err(|e| {
            RowioError::Decode(format!("raw record {} truncated: {e}", self.index))
        })?;
        let mut frame = FrameBuffer::from_rgb(self.header.width, self.header.height, data)?;
        if let Some((w, h)) = self.target {
            frame = frame.resize_cover(w, h);
        }
        self.index += 1;
        Ok(Some(TimedFrame::new(frame, f64::from_le_bytes(pts))))
    }
}

impl Iterator for RawTimeline {
    type Item = Result<TimedFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_record() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl FrameTimeline for RawTimeline {
    fn frame_count_hint(&self) -> Option<u64> {
        Some(self.total)
    }

    fn dimensions(&self) -> (u32, u32) {
        self.target
            .unwrap_or((self.header.width, self.header.height))
    }
}

/// Fixed-rate writer for the raw container.
struct RawWriter {
    out: Option<BufWriter<File>>,
    settings: EncodeSettings,
    written: u64,
}

impl FrameWriter for RawWriter {
    fn write_frame(&mut self, frame: &FrameBuffer) -> Result<()> {
        if frame.dimensions() != (self.settings.width, self.settings.height) {
            return Err(RowioError::Encode(format!(
                "frame is {}x{}, encoder expects {}x{}",
                frame.width, frame.height, self.settings.width, self.settings.height
            )));
        }
        let out = self
            .out
            .as_mut()
            .ok_or_else(|| RowioError::Encode("writer already closed".into()))?;
        let pts = self
            .settings
            .frame_rate
            .frame_time(self.written)
            .to_seconds_f64();
        out.write_all(&pts.to_le_bytes())
            .and_then(|_| out.write_all(frame.as_bytes()))
            .map_err(|e| RowioError::Encode(format!("writing raw frame: {e}")))?;
        self.written += 1;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.written
    }

    fn finish(mut self: Box<Self>) -> Result<u64> {
        if let Some(out) = self.out.take() {
            let file = out
                .into_inner()
                .map_err(|e| RowioError::Encode(format!("flushing raw video: {e}")))?;
            file.sync_all()?;
        }
        Ok(self.written)
    }
}
