//! Extraction options.
//!
//! [`ExtractOptions`] is a builder that threads the sampling policy, timeouts,
//! progress callbacks, cancellation tokens and the optional audio side-channel
//! through [`FrameExtractor`](crate::FrameExtractor) without widening every
//! function signature.
//!
//! The defaults (15 samples, JPEG quality 0.4) keep a full payload under the
//! per-request size ceiling of typical multimodal transports. Raising either
//! improves visual fidelity at the risk of the request being rejected.
//!
//! # Example
//!
//! ```no_run
//! use std::{sync::Arc, time::Duration};
//!
//! use reelscan::{AudioFormat, CancellationToken, ExtractOptions};
//!
//! let token = CancellationToken::new();
//! let options = ExtractOptions::new()
//!     .with_sample_count(10)
//!     .with_jpeg_quality(0.6)
//!     .with_seek_timeout(Some(Duration::from_secs(5)))
//!     .with_audio(AudioFormat::Wav)
//!     .with_cancellation(token.clone());
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::time::Duration;

use crate::audio::AudioFormat;
use crate::progress::{CancellationToken, NoOpProgress, ProgressCallback};

/// Number of evenly spaced frames sampled per extraction.
pub const DEFAULT_SAMPLE_COUNT: usize = 15;

/// JPEG quality factor as a fraction of the maximum.
pub const DEFAULT_JPEG_QUALITY: f32 = 0.4;

/// Upper bound on a single seek before it is reported as timed out.
pub const DEFAULT_SEEK_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on opening and probing a source.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// What the sampler does when a single timestamp cannot be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeekFailurePolicy {
    /// Abort the whole extraction. This is the default.
    #[default]
    Abort,
    /// Substitute a black frame at the last known dimensions, log a warning
    /// and continue. The artifact is flagged as a placeholder.
    BlackFrame,
}

/// Configuration for an extraction.
///
/// All fields have defaults; a default-constructed value samples 15 frames at
/// JPEG quality 0.4 with 10 second seek and probe timeouts, no audio, no
/// progress callback and no cancellation.
#[derive(Clone)]
pub struct ExtractOptions {
    pub(crate) sample_count: usize,
    pub(crate) jpeg_quality: f32,
    pub(crate) seek_timeout: Option<Duration>,
    pub(crate) probe_timeout: Option<Duration>,
    pub(crate) audio_timeout: Option<Duration>,
    pub(crate) audio: Option<AudioFormat>,
    pub(crate) seek_failure: SeekFailurePolicy,
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) cancellation: Option<CancellationToken>,
}

impl Debug for ExtractOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ExtractOptions")
            .field("sample_count", &self.sample_count)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("seek_timeout", &self.seek_timeout)
            .field("probe_timeout", &self.probe_timeout)
            .field("audio_timeout", &self.audio_timeout)
            .field("audio", &self.audio)
            .field("seek_failure", &self.seek_failure)
            .field("has_cancellation", &self.cancellation.is_some())
            .finish()
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            sample_count: DEFAULT_SAMPLE_COUNT,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            seek_timeout: Some(DEFAULT_SEEK_TIMEOUT),
            probe_timeout: Some(DEFAULT_PROBE_TIMEOUT),
            audio_timeout: None,
            audio: None,
            seek_failure: SeekFailurePolicy::Abort,
            progress: Arc::new(NoOpProgress),
            cancellation: None,
        }
    }

    /// Set how many evenly spaced frames to sample. Clamped to at least 1.
    #[must_use]
    pub fn with_sample_count(mut self, count: usize) -> Self {
        self.sample_count = count.max(1);
        self
    }

    /// Set the JPEG quality as a fraction of the maximum.
    ///
    /// Clamped into `0.0..=1.0`; non-finite values fall back to the default.
    #[must_use]
    pub fn with_jpeg_quality(mut self, quality: f32) -> Self {
        self.jpeg_quality = if quality.is_finite() {
            quality.clamp(0.0, 1.0)
        } else {
            DEFAULT_JPEG_QUALITY
        };
        self
    }

    /// Bound each seek. `None` waits indefinitely.
    #[must_use]
    pub fn with_seek_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.seek_timeout = timeout;
        self
    }

    /// Bound opening and probing the source. `None` waits indefinitely.
    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Bound the audio side-channel. Expiry yields an empty audio artifact.
    #[must_use]
    pub fn with_audio_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.audio_timeout = timeout;
        self
    }

    /// Enable the best-effort audio side-channel in the given format.
    #[must_use]
    pub fn with_audio(mut self, format: AudioFormat) -> Self {
        self.audio = Some(format);
        self
    }

    /// Disable the audio side-channel. This is the default.
    #[must_use]
    pub fn without_audio(mut self) -> Self {
        self.audio = None;
        self
    }

    /// Choose what happens when a single timestamp cannot be reached.
    #[must_use]
    pub fn with_seek_failure_policy(mut self, policy: SeekFailurePolicy) -> Self {
        self.seek_failure = policy;
        self
    }

    /// Attach a progress callback, invoked once per sampled frame.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token.
    ///
    /// When the token is cancelled the extraction stops before its next seek
    /// and returns [`ExtractionError::Cancelled`](crate::ExtractionError::Cancelled).
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Number of frames sampled per extraction.
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// JPEG quality as a fraction of the maximum.
    pub fn jpeg_quality(&self) -> f32 {
        self.jpeg_quality
    }

    /// JPEG quality on the encoder's `1..=100` scale.
    pub fn jpeg_quality_percent(&self) -> u8 {
        ((self.jpeg_quality * 100.0).round() as u8).clamp(1, 100)
    }

    /// Per-seek timeout, if any.
    pub fn seek_timeout(&self) -> Option<Duration> {
        self.seek_timeout
    }

    /// Probe timeout, if any.
    pub fn probe_timeout(&self) -> Option<Duration> {
        self.probe_timeout
    }

    /// Audio side-channel timeout, if any.
    pub fn audio_timeout(&self) -> Option<Duration> {
        self.audio_timeout
    }

    /// Audio format of the side-channel, if enabled.
    pub fn audio(&self) -> Option<AudioFormat> {
        self.audio
    }

    /// Active seek-failure policy.
    pub fn seek_failure_policy(&self) -> SeekFailurePolicy {
        self.seek_failure
    }

    /// Returns `true` if cancellation has been requested.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}
