//! Video sources.
//!
//! A [`VideoSource`] names the file an extraction reads. Playability is never
//! judged from the extension or the declared MIME type; the probe stage
//! decides.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    io::Write,
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;

use crate::error::ExtractionError;

/// Handle to a user-supplied video file.
///
/// Sources created with [`from_bytes`](VideoSource::from_bytes) own a
/// temporary copy of the data that is deleted when the source is dropped.
///
/// # Example
///
/// ```no_run
/// use reelscan::VideoSource;
///
/// let source = VideoSource::from_path("clip.mp4").with_mime_type("video/mp4");
/// assert_eq!(source.mime_type(), Some("video/mp4"));
/// ```
pub struct VideoSource {
    path: PathBuf,
    mime_type: Option<String>,
    spool: Option<NamedTempFile>,
}

impl Debug for VideoSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VideoSource")
            .field("path", &self.path)
            .field("mime_type", &self.mime_type)
            .field("spooled", &self.spool.is_some())
            .finish()
    }
}

impl VideoSource {
    /// Refer to a video file on disk. The file is not touched until probing.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            mime_type: None,
            spool: None,
        }
    }

    /// Spool in-memory video data to a temporary file.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::IoError`] if the temporary file cannot be
    /// created or written.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ExtractionError> {
        let mut spool = tempfile::Builder::new().prefix("reelscan-").tempfile()?;
        spool.write_all(bytes)?;
        spool.flush()?;

        log::debug!(
            "Spooled {} bytes of video data to {}",
            bytes.len(),
            spool.path().display()
        );

        Ok(Self {
            path: spool.path().to_path_buf(),
            mime_type: None,
            spool: Some(spool),
        })
    }

    /// Attach the MIME type the uploader declared. Informational only.
    #[must_use]
    pub fn with_mime_type<S: Into<String>>(mut self, mime_type: S) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Path the decoder reads from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Declared MIME type, if any.
    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    /// Returns `true` if the source owns a temporary copy of its data.
    pub fn is_spooled(&self) -> bool {
        self.spool.is_some()
    }

    /// Build a [`ExtractionError::ProbeError`] for this source.
    pub fn probe_error<S: Into<String>>(&self, reason: S) -> ExtractionError {
        ExtractionError::ProbeError {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }
}
