//! Reusable raw frame buffer.
//!
//! The encoder reads tightly packed RGBA rows from its stdin. A
//! [`RawFrameBuffer`] is allocated once per pipeline run and refilled for
//! every frame, so steady-state forwarding does not allocate for RGBA or RGB
//! sources.

use image::{DynamicImage, GenericImageView};

use crate::config::BYTES_PER_PIXEL;
use crate::error::{Error, Result};

/// A `width * height * 4` byte buffer holding one RGBA frame.
#[derive(Debug, Clone)]
pub struct RawFrameBuffer {
    width: u32,
    height: u32,
    buf: Vec<u8>,
}

impl RawFrameBuffer {
    /// Allocate a zeroed buffer for the given resolution.
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize * BYTES_PER_PIXEL;
        Self {
            width,
            height,
            buf: vec![0; len],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Overwrite the buffer with `img`, converted to RGBA.
    ///
    /// Returns [`Error::FrameDimensions`] without touching the buffer if the
    /// image does not match the configured resolution.
    pub fn fill_from(&mut self, img: &DynamicImage) -> Result<()> {
        let (w, h) = img.dimensions();
        if (w, h) != (self.width, self.height) {
            return Err(Error::FrameDimensions {
                expected: (self.width, self.height),
                actual: (w, h),
            });
        }

        match img {
            DynamicImage::ImageRgba8(rgba) => {
                self.buf.copy_from_slice(rgba.as_raw());
            }
            DynamicImage::ImageRgb8(rgb) => {
                for (dst, src) in self
                    .buf
                    .chunks_exact_mut(BYTES_PER_PIXEL)
                    .zip(rgb.as_raw().chunks_exact(3))
                {
                    dst[..3].copy_from_slice(src);
                    dst[3] = u8::MAX;
                }
            }
            other => {
                let rgba = other.to_rgba8();
                self.buf.copy_from_slice(rgba.as_raw());
            }
        }

        Ok(())
    }
}
