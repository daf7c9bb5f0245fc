//! Extraction output.
//!
//! [`ExtractionResult`] holds the ordered frame payloads and the optional
//! audio payload. Every payload is base64 text so it can be embedded directly
//! in a JSON request body.

use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use serde_json::{Value, json};

use crate::{audio::AudioFormat, error::ExtractionError, probe::ProbeInfo};

/// MIME type of every frame payload.
pub const FRAME_MIME_TYPE: &str = "image/jpeg";

/// One sampled still.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameArtifact {
    /// Position in the sample sequence.
    pub index: usize,
    /// Timestamp the decoder was asked to seek to.
    pub timestamp: Duration,
    /// Width of the encoded picture.
    pub width: u32,
    /// Height of the encoded picture.
    pub height: u32,
    /// Base64 JPEG body.
    pub data: String,
    /// `true` when the picture is a black stand-in for an unreachable seek.
    pub placeholder: bool,
}

impl FrameArtifact {
    /// Decode the payload back to JPEG bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::VideoDecodeError`] if the payload is not
    /// valid base64.
    pub fn jpeg_bytes(&self) -> Result<Vec<u8>, ExtractionError> {
        BASE64_STANDARD
            .decode(&self.data)
            .map_err(|error| ExtractionError::VideoDecodeError(error.to_string()))
    }
}

/// The audio side-channel payload. Empty when audio was disabled or failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioArtifact {
    data: String,
    format: Option<AudioFormat>,
}

impl AudioArtifact {
    /// No audio available.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Base64-encode `bytes`. Empty input gives an empty artifact.
    pub fn from_bytes(bytes: &[u8], format: AudioFormat) -> Self {
        if bytes.is_empty() {
            return Self::empty();
        }
        Self {
            data: BASE64_STANDARD.encode(bytes),
            format: Some(format),
        }
    }

    /// Base64 payload; the empty string when no audio is available.
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Format of the payload, if any.
    pub fn format(&self) -> Option<AudioFormat> {
        self.format
    }

    /// Returns `true` when no audio is available.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Everything one extraction produced. Owned by the caller.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    /// Probe metadata of the source.
    pub probe: ProbeInfo,
    /// Sampled stills, in timestamp order.
    pub frames: Vec<FrameArtifact>,
    /// Audio side-channel payload.
    pub audio: AudioArtifact,
}

impl ExtractionResult {
    /// Base64 frame payloads in order.
    pub fn frame_payloads(&self) -> Vec<&str> {
        self.frames.iter().map(|frame| frame.data.as_str()).collect()
    }

    /// Attachment parts for a multimodal request.
    ///
    /// One `{"inlineData": {"data", "mimeType"}}` object per frame in order,
    /// followed by one audio part when audio is available.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use reelscan::{FrameExtractor, VideoSource};
    ///
    /// let result = FrameExtractor::default()
    ///     .extract_blocking(&VideoSource::from_path("clip.mp4"))?;
    /// let body = serde_json::json!({ "parts": result.inline_parts() });
    /// # Ok::<(), reelscan::ExtractionError>(())
    /// ```
    pub fn inline_parts(&self) -> Vec<Value> {
        let mut parts: Vec<Value> = self
            .frames
            .iter()
            .map(|frame| inline_part(&frame.data, FRAME_MIME_TYPE))
            .collect();

        if let Some(format) = self.audio.format()
            && !self.audio.is_empty()
        {
            parts.push(inline_part(self.audio.data(), format.mime_type()));
        }

        parts
    }
}

fn inline_part(data: &str, mime_type: &str) -> Value {
    json!({
        "inlineData": {
            "data": data,
            "mimeType": mime_type,
        }
    })
}
