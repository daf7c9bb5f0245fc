//! Probe results.
//!
//! [`ProbeInfo`] is what the probe stage learns about a source before any
//! frame is decoded: how long it runs and how large its pictures claim to be.
//! The claimed size is advisory; the sampler sizes its raster surface from
//! each decoded picture.

use std::time::Duration;

use crate::{error::ExtractionError, source::VideoSource};

/// Duration and native dimensions of a video source.
///
/// # Example
///
/// ```no_run
/// use reelscan::{FrameExtractor, VideoSource};
///
/// # async fn example() -> Result<(), reelscan::ExtractionError> {
/// let extractor = FrameExtractor::default();
/// let info = extractor.probe(&VideoSource::from_path("clip.mp4")).await?;
/// println!("{:.2}s at {}x{}", info.duration.as_secs_f64(), info.width, info.height);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct ProbeInfo {
    /// Total duration of the video.
    pub duration: Duration,
    /// Picture width in pixels, as reported by the container.
    pub width: u32,
    /// Picture height in pixels, as reported by the container.
    pub height: u32,
}

impl ProbeInfo {
    /// Create a probe result.
    pub fn new(duration: Duration, width: u32, height: u32) -> Self {
        Self {
            duration,
            width,
            height,
        }
    }

    /// Check that the source can be sampled.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::ProbeError`] for a zero duration or a zero
    /// dimension.
    pub fn validate(self, source: &VideoSource) -> Result<Self, ExtractionError> {
        if self.duration.is_zero() {
            return Err(source.probe_error("video reports a zero duration"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(source.probe_error(format!(
                "video reports invalid dimensions {}x{}",
                self.width, self.height
            )));
        }
        Ok(self)
    }
}
