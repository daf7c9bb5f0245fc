//! # reelscan
//!
//! Turn an uploaded video into a small, fixed-size set of evenly spaced JPEG
//! stills (and, optionally, its audio track) encoded as base64, ready to be
//! attached to a multimodal request.
//!
//! Extraction runs in three stages against one decode context:
//!
//! 1. **Probe**: open the source, silence its audio, read duration and
//!    native dimensions.
//! 2. **Sample**: seek to `duration / (N + 1) * (i + 1)` for each of the
//!    `N` samples in order, rasterize the picture at full resolution and
//!    encode it as JPEG. Progress is reported after every frame.
//! 3. **Audio** (opt-in, best effort): transcode the best audio track. Any
//!    failure yields an empty payload instead of an error.
//!
//! The decode context is released exactly once, before the audio stage or
//! as soon as any stage fails.
//!
//! ## Quick Start
//!
//! ```no_run
//! use reelscan::{FrameExtractor, VideoSource};
//!
//! let extractor = FrameExtractor::default();
//! let result = extractor.extract_blocking(&VideoSource::from_path("clip.mp4"))?;
//!
//! assert_eq!(result.frames.len(), 15);
//! let request = serde_json::json!({ "parts": result.inline_parts() });
//! # Ok::<(), reelscan::ExtractionError>(())
//! ```
//!
//! ### Async, with progress and a timeout
//!
//! ```no_run
//! use std::{sync::Arc, time::Duration};
//!
//! use reelscan::{
//!     ExtractOptions, FrameExtractor, ProgressCallback, ProgressInfo, VideoSource,
//! };
//!
//! struct Report;
//!
//! impl ProgressCallback for Report {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         eprintln!("{}%", info.percentage);
//!     }
//! }
//!
//! # async fn example(bytes: Vec<u8>) -> Result<(), reelscan::ExtractionError> {
//! let options = ExtractOptions::new()
//!     .with_seek_timeout(Some(Duration::from_secs(5)))
//!     .with_progress(Arc::new(Report));
//! let source = VideoSource::from_bytes(&bytes)?.with_mime_type("video/mp4");
//! let result = FrameExtractor::new(options).extract(&source).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Backends
//!
//! [`FrameExtractor`] is generic over a [`MediaBackend`]. The default,
//! [`FfmpegBackend`], decodes through FFmpeg on a dedicated thread per
//! source. FFmpeg development libraries must be installed.

pub mod artifact;
pub mod audio;
pub mod backend;
pub mod configuration;
mod conversion;
pub mod decoder;
pub mod error;
pub mod extractor;
pub mod ffmpeg;
pub mod probe;
pub mod progress;
pub mod raster;
mod sampler;
pub mod sampling;
pub mod source;

pub use artifact::{AudioArtifact, ExtractionResult, FRAME_MIME_TYPE, FrameArtifact};
pub use audio::AudioFormat;
pub use backend::{DecodeContext, MediaBackend};
pub use configuration::{
    DEFAULT_JPEG_QUALITY, DEFAULT_PROBE_TIMEOUT, DEFAULT_SAMPLE_COUNT, DEFAULT_SEEK_TIMEOUT,
    ExtractOptions, SeekFailurePolicy,
};
pub use decoder::{FfmpegBackend, FfmpegContext};
pub use error::ExtractionError;
pub use extractor::FrameExtractor;
pub use ffmpeg::{FfmpegLogLevel, set_ffmpeg_log_level};
pub use probe::ProbeInfo;
pub use progress::{CancellationToken, OperationType, ProgressCallback, ProgressInfo};
pub use raster::Picture;
pub use sampling::sample_timestamps;
pub use source::VideoSource;
