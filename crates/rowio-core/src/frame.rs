//! Frame buffer types for video frames in CPU memory.
//!
//! Frames are packed RGB24 with no row padding, which is the layout FFmpeg
//! produces for `-pix_fmt rgb24` and consumes on its rawvideo input.

use serde::{Deserialize, Serialize};

use crate::error::{Result, RowioError};

/// Bytes per RGB24 pixel.
pub const BYTES_PER_PIXEL: usize = 3;

/// An 8-bit RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Self = Self(0, 0, 0);
    pub const WHITE: Self = Self(255, 255, 255);

    /// Channels as an array.
    #[inline]
    pub fn to_array(self) -> [u8; 3] {
        [self.0, self.1, self.2]
    }
}

/// A video frame in CPU memory (packed RGB24).
#[derive(Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    data: Vec<u8>,
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("hash", &format_args!("{:016x}", self.content_hash()))
            .finish()
    }
}

impl FrameBuffer {
    /// Create a black frame with the given dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; Self::byte_len(width, height)],
        }
    }

    /// Create a frame filled with a single colour.
    pub fn filled(width: u32, height: u32, colour: Rgb) -> Self {
        let mut data = Vec::with_capacity(Self::byte_len(width, height));
        for _ in 0..(width as usize * height as usize) {
            data.extend_from_slice(&colour.to_array());
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Wrap existing RGB24 bytes.
    pub fn from_rgb(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = Self::byte_len(width, height);
        if data.len() != expected {
            return Err(RowioError::Validation(format!(
                "RGB buffer for {}x{} must be {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Bytes needed for an RGB24 frame of this size.
    #[inline]
    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * BYTES_PER_PIXEL
    }

    /// Raw pixel bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Raw pixel bytes, mutably.
    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consume into the raw byte vector.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Frame dimensions.
    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Read one pixel. Returns `None` outside the frame.
    #[inline]
    pub fn pixel(&self, x: i64, y: i64) -> Option<Rgb> {
        let i = self.offset(x, y)?;
        Some(Rgb(self.data[i], self.data[i + 1], self.data[i + 2]))
    }

    /// Write one pixel. Writes outside the frame are clipped.
    #[inline]
    pub fn set_pixel(&mut self, x: i64, y: i64, colour: Rgb) {
        if let Some(i) = self.offset(x, y) {
            self.data[i..i + 3].copy_from_slice(&colour.to_array());
        }
    }

    #[inline]
    fn offset(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL)
    }

    /// 64-bit FNV-1a hash of the pixel contents.
    pub fn content_hash(&self) -> u64 {
        const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const PRIME: u64 = 0x0100_0000_01b3;
        let mut hash = OFFSET;
        for b in self
            .width
            .to_le_bytes()
            .iter()
            .chain(self.height.to_le_bytes().iter())
            .chain(self.data.iter())
        {
            hash ^= *b as u64;
            hash = hash.wrapping_mul(PRIME);
        }
        hash
    }

    /// Scale uniformly to fill `width` x `height`, then crop the centre.
    ///
    /// Nearest-neighbour sampling, so every output pixel is a copy of a
    /// source pixel.
    pub fn resize_cover(&self, width: u32, height: u32) -> Self {
        if (self.width, self.height) == (width, height) {
            return self.clone();
        }
        let mut out = Self::new(width, height);
        if self.width == 0 || self.height == 0 || width == 0 || height == 0 {
            return out;
        }

        let scale = f64::max(
            width as f64 / self.width as f64,
            height as f64 / self.height as f64,
        );
        let scaled_w = (self.width as f64 * scale).round().max(1.0);
        let scaled_h = (self.height as f64 * scale).round().max(1.0);
        let x0 = ((scaled_w - width as f64) / 2.0).floor();
        let y0 = ((scaled_h - height as f64) / 2.0).floor();

        let src_stride = self.width as usize * BYTES_PER_PIXEL;
        for y in 0..height as usize {
            let sy = (((y as f64 + y0 + 0.5) / scale) as usize).min(self.height as usize - 1);
            let src_row = &self.data[sy * src_stride..(sy + 1) * src_stride];
            let dst_start = y * width as usize * BYTES_PER_PIXEL;
            for x in 0..width as usize {
                let sx = (((x as f64 + x0 + 0.5) / scale) as usize).min(self.width as usize - 1);
                let s = sx * BYTES_PER_PIXEL;
                let d = dst_start + x * BYTES_PER_PIXEL;
                out.data[d..d + 3].copy_from_slice(&src_row[s..s + 3]);
            }
        }
        out
    }

    /// Create a test pattern frame (colour bars).
    pub fn test_pattern(width: u32, height: u32) -> Self {
        const BARS: [Rgb; 8] = [
            Rgb(255, 255, 255),
            Rgb(255, 255, 0),
            Rgb(0, 255, 255),
            Rgb(0, 255, 0),
            Rgb(255, 0, 255),
            Rgb(255, 0, 0),
            Rgb(0, 0, 255),
            Rgb(0, 0, 0),
        ];
        let mut frame = Self::new(width, height);
        for y in 0..height as i64 {
            for x in 0..width as i64 {
                let bar = (x as u64 * 8 / width.max(1) as u64) as usize;
                frame.set_pixel(x, y, BARS[bar.min(7)]);
            }
        }
        frame
    }
}
