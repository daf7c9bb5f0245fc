//! Decoded pictures and the raster surface they are captured into.
//!
//! A decode context hands the sampler a [`Picture`]; the sampler copies it
//! into a reusable [`RasterSurface`] sized to the picture, then encodes the
//! surface as JPEG.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use image::{RgbImage, codecs::jpeg::JpegEncoder};

use crate::error::ExtractionError;

/// A decoded picture as tightly packed 8-bit RGB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picture {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Picture {
    /// Wrap packed RGB24 pixel data.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::VideoDecodeError`] if either dimension is
    /// zero or `pixels` is not exactly `width * height * 3` bytes long.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, ExtractionError> {
        let expected = width as usize * height as usize * 3;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(ExtractionError::VideoDecodeError(format!(
                "picture of {width}x{height} carries {} bytes, expected {expected}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// A picture filled with one colour.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Packed RGB24 bytes, row after row.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// In-memory RGB buffer reused across samples.
pub(crate) struct RasterSurface {
    buffer: RgbImage,
}

impl RasterSurface {
    pub(crate) fn new() -> Self {
        Self {
            buffer: RgbImage::new(0, 0),
        }
    }

    pub(crate) fn dimensions(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }

    /// Resize to exactly `width` x `height`. Reallocates only on change.
    pub(crate) fn configure(&mut self, width: u32, height: u32) {
        if self.buffer.dimensions() != (width, height) {
            log::debug!("Configuring raster surface to {width}x{height}");
            self.buffer = RgbImage::new(width, height);
        }
    }

    /// Copy a picture at full resolution.
    pub(crate) fn draw(&mut self, picture: &Picture) -> Result<(), ExtractionError> {
        if self.buffer.dimensions() != (picture.width(), picture.height()) {
            return Err(ExtractionError::VideoDecodeError(format!(
                "picture of {}x{} does not fit a {}x{} surface",
                picture.width(),
                picture.height(),
                self.buffer.width(),
                self.buffer.height()
            )));
        }
        self.buffer.copy_from_slice(picture.pixels());
        Ok(())
    }

    /// Paint the whole surface black.
    pub(crate) fn clear(&mut self) {
        self.buffer.fill(0);
    }

    /// Encode as baseline JPEG at `quality` (1..=100).
    pub(crate) fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, String> {
        let mut bytes = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality);
        encoder
            .encode_image(&self.buffer)
            .map_err(|error| error.to_string())?;
        Ok(bytes)
    }

    /// Encode as JPEG and return the base64 body, without any `data:` header.
    pub(crate) fn encode_jpeg_base64(&self, quality: u8) -> Result<String, String> {
        self.encode_jpeg(quality)
            .map(|bytes| BASE64_STANDARD.encode(bytes))
    }
}
