//! Decoder abstraction.
//!
//! [`MediaBackend`] opens [`DecodeContext`]s and decodes audio tracks. The
//! crate ships [`FfmpegBackend`](crate::FfmpegBackend); other
//! implementations (a browser media element bridge, a scripted decoder in
//! tests) plug into [`FrameExtractor`](crate::FrameExtractor) the same way.
//!
//! A decode context is a single-owner resource: it holds at most one
//! in-flight seek and one current picture, which is why every mutating method
//! takes `&mut self`. Dropping the context releases it.

use std::{future::Future, time::Duration};

use crate::{
    audio::AudioFormat, error::ExtractionError, probe::ProbeInfo, raster::Picture,
    source::VideoSource,
};

/// Opens decode contexts and decodes audio side-channels.
pub trait MediaBackend: Send + Sync {
    /// The decode context this backend produces.
    type Context: DecodeContext;

    /// Allocate a decode context bound to `source`.
    ///
    /// Failing to open the source must be reported as
    /// [`ExtractionError::ProbeError`].
    fn open(
        &self,
        source: &VideoSource,
    ) -> impl Future<Output = Result<Self::Context, ExtractionError>> + Send;

    /// Decode the best audio track of `source` and encode it as `format`.
    ///
    /// Runs after the decode context has been released.
    fn decode_audio(
        &self,
        source: &VideoSource,
        format: AudioFormat,
    ) -> impl Future<Output = Result<Vec<u8>, ExtractionError>> + Send;
}

/// A decoding context bound to one source.
pub trait DecodeContext: Send {
    /// Silence (or restore) playback audio on this context.
    fn set_muted(&mut self, muted: bool);

    /// Resolve duration and native dimensions.
    fn probe(&mut self) -> impl Future<Output = Result<ProbeInfo, ExtractionError>> + Send;

    /// Seek to `timestamp` and resolve once a displayable frame is current.
    fn seek(
        &mut self,
        timestamp: Duration,
    ) -> impl Future<Output = Result<(), ExtractionError>> + Send;

    /// The picture the last completed seek landed on.
    fn current_picture(&self) -> Option<&Picture>;
}
