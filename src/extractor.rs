//! The extraction orchestrator.
//!
//! [`FrameExtractor`] runs the three stages (probe, sample, audio) against a
//! [`MediaBackend`], owns the decode context for the duration of one
//! extraction and releases it on every exit path.

use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Instant,
};

use crate::{
    artifact::{AudioArtifact, ExtractionResult},
    audio::AudioFormat,
    backend::{DecodeContext, MediaBackend},
    configuration::ExtractOptions,
    decoder::FfmpegBackend,
    error::ExtractionError,
    probe::ProbeInfo,
    sampler::sample_frames,
    source::VideoSource,
};

/// Turns a video source into sampled JPEG stills and an optional audio track.
///
/// An extractor runs at most one extraction at a time; a concurrent call
/// fails with [`ExtractionError::ExtractionInProgress`]. Use one extractor
/// per concurrent job.
///
/// # Example
///
/// ```no_run
/// use reelscan::{ExtractOptions, FrameExtractor, VideoSource};
///
/// # async fn example() -> Result<(), reelscan::ExtractionError> {
/// let extractor = FrameExtractor::new(ExtractOptions::new().with_sample_count(8));
/// let result = extractor.extract(&VideoSource::from_path("clip.mp4")).await?;
///
/// for frame in &result.frames {
///     println!("{:>6.2}s  {} bytes", frame.timestamp.as_secs_f64(), frame.data.len());
/// }
/// # Ok(())
/// # }
/// ```
pub struct FrameExtractor<B: MediaBackend = FfmpegBackend> {
    backend: B,
    options: ExtractOptions,
    in_flight: AtomicBool,
}

impl Default for FrameExtractor<FfmpegBackend> {
    fn default() -> Self {
        Self::new(ExtractOptions::default())
    }
}

impl FrameExtractor<FfmpegBackend> {
    /// Create an extractor backed by FFmpeg.
    pub fn new(options: ExtractOptions) -> Self {
        Self::with_backend(FfmpegBackend, options)
    }
}

impl<B: MediaBackend> FrameExtractor<B> {
    /// Create an extractor with a custom backend.
    pub fn with_backend(backend: B, options: ExtractOptions) -> Self {
        Self {
            backend,
            options,
            in_flight: AtomicBool::new(false),
        }
    }

    /// The options every extraction uses.
    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Returns `true` while an extraction is running.
    pub fn is_extracting(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Probe, sample and (optionally) transcode audio.
    ///
    /// The decode context is released before the audio stage and on every
    /// failure. Audio failures never fail the extraction; they produce an
    /// empty audio artifact.
    ///
    /// # Errors
    ///
    /// - [`ExtractionError::ExtractionInProgress`] if this extractor is busy.
    /// - [`ExtractionError::ProbeError`] if the source cannot be opened, has
    ///   no usable duration or dimensions, or probing timed out.
    /// - [`ExtractionError::SeekTimeout`] / [`ExtractionError::SeekError`]
    ///   if a timestamp cannot be reached (unless the seek-failure policy
    ///   substitutes black frames).
    /// - [`ExtractionError::EncodeError`] if a frame cannot be encoded.
    /// - [`ExtractionError::Cancelled`] if the cancellation token fires.
    pub async fn extract(&self, source: &VideoSource) -> Result<ExtractionResult, ExtractionError> {
        let _in_flight = InFlightGuard::acquire(&self.in_flight)?;
        let started = Instant::now();

        log::info!(
            "Extracting {} frames from {}",
            self.options.sample_count(),
            source.path().display()
        );

        let (probe, frames) = {
            let (mut context, probe) = self.open_and_probe(source).await?;
            log::debug!(
                "Probed {}: {:.3}s, {}x{}",
                source.path().display(),
                probe.duration.as_secs_f64(),
                probe.width,
                probe.height
            );
            let frames = sample_frames(&mut context, &probe, &self.options).await?;
            (probe, frames)
        };

        if self.options.is_cancelled() {
            return Err(ExtractionError::Cancelled);
        }

        let audio = match self.options.audio() {
            Some(format) => self.audio_artifact(source, format).await,
            None => AudioArtifact::empty(),
        };

        log::info!(
            "Extracted {} frames from {} in {:.2?}{}",
            frames.len(),
            source.path().display(),
            started.elapsed(),
            if audio.is_empty() { "" } else { " with audio" }
        );

        Ok(ExtractionResult {
            probe,
            frames,
            audio,
        })
    }

    /// Run [`extract`](Self::extract) to completion on a private
    /// current-thread runtime.
    ///
    /// Must not be called from inside an async context.
    ///
    /// # Errors
    ///
    /// Same as [`extract`](Self::extract), plus
    /// [`ExtractionError::IoError`] if the runtime cannot be built.
    pub fn extract_blocking(&self, source: &VideoSource) -> Result<ExtractionResult, ExtractionError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.extract(source))
    }

    /// Open the source, read its duration and dimensions, and release it.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::ProbeError`] under the same conditions as
    /// the probe stage of [`extract`](Self::extract).
    pub async fn probe(&self, source: &VideoSource) -> Result<ProbeInfo, ExtractionError> {
        let (_context, probe) = self.open_and_probe(source).await?;
        Ok(probe)
    }

    async fn open_and_probe(
        &self,
        source: &VideoSource,
    ) -> Result<(B::Context, ProbeInfo), ExtractionError> {
        if self.options.is_cancelled() {
            return Err(ExtractionError::Cancelled);
        }

        let opening = async {
            let mut context = self.backend.open(source).await?;
            context.set_muted(true);
            let probe = context.probe().await?;
            Ok::<_, ExtractionError>((context, probe))
        };

        let (context, probe) = match self.options.probe_timeout() {
            Some(timeout) => tokio::time::timeout(timeout, opening)
                .await
                .map_err(|_| source.probe_error(format!("probe timed out after {timeout:?}")))??,
            None => opening.await?,
        };

        Ok((context, probe.validate(source)?))
    }

    async fn audio_artifact(&self, source: &VideoSource, format: AudioFormat) -> AudioArtifact {
        match self.decode_audio(source, format).await {
            Ok(bytes) if bytes.is_empty() => {
                log::warn!("Audio track of {} decoded to nothing", source.path().display());
                AudioArtifact::empty()
            }
            Ok(bytes) => {
                log::debug!("Encoded {} bytes of {format} audio", bytes.len());
                AudioArtifact::from_bytes(&bytes, format)
            }
            Err(error) => {
                log::warn!(
                    "No audio available for {}: {error}",
                    source.path().display()
                );
                AudioArtifact::empty()
            }
        }
    }

    async fn decode_audio(
        &self,
        source: &VideoSource,
        format: AudioFormat,
    ) -> Result<Vec<u8>, ExtractionError> {
        let decoding = self.backend.decode_audio(source, format);
        match self.options.audio_timeout() {
            Some(timeout) => tokio::time::timeout(timeout, decoding)
                .await
                .map_err(|_| {
                    ExtractionError::AudioDecodeError(format!(
                        "audio decoding timed out after {timeout:?}"
                    ))
                })?,
            None => decoding.await,
        }
    }
}

/// Holds the extractor's in-flight flag; clears it on drop.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, ExtractionError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ExtractionError::ExtractionInProgress)?;
        Ok(Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
