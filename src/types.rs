//! Shared geometry and frame types
//!
//! Every buffer in this crate uses the same layout: 4 bytes per pixel in
//! B, G, R, A order, rows stored top-down with no padding.

use crate::errors::CaptureError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Bytes per pixel in the BGRA layout
pub const BYTES_PER_PIXEL: usize = 4;

/// Fixed frame geometry of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawGeometry")]
pub struct Geometry {
    width: u32,
    height: u32,
}

#[derive(Deserialize)]
struct RawGeometry {
    width: u32,
    height: u32,
}

impl TryFrom<RawGeometry> for Geometry {
    type Error = CaptureError;

    fn try_from(raw: RawGeometry) -> Result<Self, Self::Error> {
        let width = i32::try_from(raw.width).unwrap_or(i32::MIN);
        let height = i32::try_from(raw.height).unwrap_or(i32::MIN);
        Geometry::new(width, height)
    }
}

impl Geometry {
    pub const FULL_HD: Geometry = Geometry {
        width: 1920,
        height: 1080,
    };

    /// Validate raw dimensions as received across the foreign boundary.
    pub fn new(width: i32, height: i32) -> Result<Self, CaptureError> {
        if width <= 0 || height <= 0 {
            return Err(CaptureError::InvalidGeometry(format!(
                "{}x{} (both dimensions must be positive)",
                width, height
            )));
        }

        let geometry = Self {
            width: width as u32,
            height: height as u32,
        };
        geometry.checked_buffer_size().ok_or_else(|| {
            CaptureError::InvalidGeometry(format!("{}x{} frame does not fit in memory", width, height))
        })?;
        Ok(geometry)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per row
    pub fn stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    /// Exact size of one frame: `width * height * 4`
    pub fn buffer_size(&self) -> usize {
        self.stride() * self.height as usize
    }

    fn checked_buffer_size(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(BYTES_PER_PIXEL)
    }

    /// Byte offset of pixel (x, y), or `None` outside the frame.
    pub fn pixel_offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.stride() + x as usize * BYTES_PER_PIXEL)
    }
}

impl std::fmt::Display for Geometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A captured frame borrowed from the capture loop's buffer.
///
/// Only valid for the duration of a sink call; sinks that queue frames must
/// copy into an [`OwnedFrame`].
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    /// 1-based, strictly increasing within a session
    pub sequence: u64,
    /// Session time in microseconds, paused intervals excluded
    pub timestamp_us: u64,
    pub geometry: Geometry,
    pub data: &'a [u8],
}

impl Frame<'_> {
    pub fn to_owned_frame(&self) -> OwnedFrame {
        OwnedFrame {
            sequence: self.sequence,
            timestamp_us: self.timestamp_us,
            geometry: self.geometry,
            data: Bytes::copy_from_slice(self.data),
        }
    }

    /// BGRA bytes of pixel (x, y)
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        pixel_at(self.geometry, self.data, x, y)
    }
}

/// Owned counterpart of [`Frame`], cheap to clone and send across threads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedFrame {
    pub sequence: u64,
    pub timestamp_us: u64,
    pub geometry: Geometry,
    pub data: Bytes,
}

impl OwnedFrame {
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        pixel_at(self.geometry, &self.data, x, y)
    }

    pub fn to_rgba_image(&self) -> Option<image::RgbaImage> {
        bgra_to_rgba_image(self.geometry, &self.data)
    }
}

fn pixel_at(geometry: Geometry, data: &[u8], x: u32, y: u32) -> Option<[u8; 4]> {
    let offset = geometry.pixel_offset(x, y)?;
    let px = data.get(offset..offset + BYTES_PER_PIXEL)?;
    Some([px[0], px[1], px[2], px[3]])
}

/// Convert a top-down BGRA buffer into an RGBA image.
///
/// Returns `None` if `data` is shorter than one frame.
pub fn bgra_to_rgba_image(geometry: Geometry, data: &[u8]) -> Option<image::RgbaImage> {
    let frame = data.get(..geometry.buffer_size())?;
    let mut rgba = Vec::with_capacity(frame.len());
    for px in frame.chunks_exact(BYTES_PER_PIXEL) {
        rgba.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
    }
    image::RgbaImage::from_raw(geometry.width(), geometry.height(), rgba)
}
