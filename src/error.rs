//! Error types for the `reelscan` crate.
//!
//! This module defines [`ExtractionError`], the unified error type returned by
//! every fallible operation in the crate. Errors carry enough context (source
//! path, sample timestamp, frame index) to diagnose a failed extraction
//! without extra logging at the call site.

use std::{io::Error as IoError, path::PathBuf, time::Duration};

use ffmpeg_next::Error as FfmpegError;
use thiserror::Error;

/// The unified error type for all `reelscan` operations.
///
/// Frame-sampling errors abort the whole extraction. Audio errors never reach
/// the caller of [`FrameExtractor::extract`](crate::FrameExtractor::extract):
/// they are logged and downgraded to an empty audio artifact.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExtractionError {
    /// The source could not be opened or its metadata could not be resolved.
    #[error("Failed to probe video source {path}: {reason}")]
    ProbeError {
        /// Path of the video source.
        path: PathBuf,
        /// Underlying reason the probe failed.
        reason: String,
    },

    /// A seek did not complete within the configured timeout.
    #[error("Seek to {timestamp:?} timed out after {timeout:?}")]
    SeekTimeout {
        /// The timestamp that was requested.
        timestamp: Duration,
        /// The timeout that expired.
        timeout: Duration,
    },

    /// The decoder could not land on a displayable frame for a timestamp.
    #[error("Failed to seek to {timestamp:?}: {reason}")]
    SeekError {
        /// The timestamp that was requested.
        timestamp: Duration,
        /// Underlying reason the seek failed.
        reason: String,
    },

    /// A sampled frame could not be encoded as JPEG.
    #[error("Failed to encode frame {index}: {reason}")]
    EncodeError {
        /// Position of the frame in the sample sequence.
        index: usize,
        /// Underlying reason the encode failed.
        reason: String,
    },

    /// A decoded picture was malformed.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// Audio data could not be decoded or transcoded.
    #[error("Failed to decode audio: {0}")]
    AudioDecodeError(String),

    /// Another extraction is already running on the same extractor.
    #[error("An extraction is already in progress on this extractor")]
    ExtractionInProgress,

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while spooling or reading files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),
}

impl ExtractionError {
    /// Returns `true` for [`SeekTimeout`](Self::SeekTimeout) and
    /// [`SeekError`](Self::SeekError).
    pub fn is_seek_failure(&self) -> bool {
        matches!(
            self,
            ExtractionError::SeekTimeout { .. } | ExtractionError::SeekError { .. }
        )
    }
}

impl From<FfmpegError> for ExtractionError {
    fn from(error: FfmpegError) -> Self {
        ExtractionError::FfmpegError(error.to_string())
    }
}
