//! Decoded video frame.

use chrono::{DateTime, Utc};
use image::RgbImage;

use crate::error::{MediaError, MediaResult};

/// A decoded frame in packed RGB24 layout.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// `width * height * 3` bytes, row-major
    pub data: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    /// Wrap RGB24 bytes, validating the buffer length.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> MediaResult<Self> {
        let expected = Self::byte_len(width, height);
        if data.len() != expected {
            return Err(MediaError::InvalidFrame(format!(
                "expected {} bytes for {}x{} RGB24, got {}",
                expected,
                width,
                height,
                data.len()
            )));
        }

        Ok(Self {
            width,
            height,
            data,
            captured_at: Utc::now(),
        })
    }

    /// Solid black frame, useful for health checks and tests.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; Self::byte_len(width, height)],
            captured_at: Utc::now(),
        }
    }

    /// Size in bytes of an RGB24 frame.
    #[inline]
    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }

    /// Copy the frame into an `RgbImage`.
    pub fn to_rgb_image(&self) -> MediaResult<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| MediaError::InvalidFrame("buffer does not match dimensions".into()))
    }
}
