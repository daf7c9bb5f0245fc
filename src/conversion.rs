//! Internal conversion helpers for the FFmpeg backend.
//!
//! Pixel-data copying and timestamp conversion between [`Duration`] and
//! FFmpeg's time bases.

use std::time::Duration;

use ffmpeg_next::{Rational, frame::Video as VideoFrame};

/// FFmpeg's `AV_NOPTS_VALUE`.
pub(crate) const NO_TIMESTAMP: i64 = i64::MIN;

/// Copy an RGB24 frame into a tightly packed buffer.
///
/// FFmpeg frames frequently carry per-row padding (stride > width * 3); the
/// padding is dropped.
pub(crate) fn frame_to_rgb_buffer(video_frame: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let row_length = (width as usize) * 3;
    let data = video_frame.data(0);

    if stride == row_length {
        data[..row_length * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(row_length * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + row_length]);
        }
        buffer
    }
}

/// Convert a [`Duration`] to a container seek target in AV_TIME_BASE
/// (microseconds), as `avformat_seek_file` expects with `stream_index = -1`.
pub(crate) fn duration_to_seek_timestamp(duration: Duration) -> i64 {
    i64::try_from(duration.as_micros()).unwrap_or(i64::MAX)
}

/// Seek target for `timestamp` measured from a stream that starts at
/// `start_seconds` on the container clock.
pub(crate) fn seek_position(timestamp: Duration, start_seconds: f64) -> i64 {
    let offset = if start_seconds.is_finite() {
        (start_seconds * 1_000_000.0).round() as i64
    } else {
        0
    };
    duration_to_seek_timestamp(timestamp).saturating_add(offset)
}

/// Rescale a PTS value from a stream time base to seconds.
pub(crate) fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    pts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64
}

/// Convert a container duration in AV_TIME_BASE to a [`Duration`].
///
/// Unknown or negative values give `None`.
pub(crate) fn container_duration(microseconds: i64) -> Option<Duration> {
    (microseconds > 0).then(|| Duration::from_micros(microseconds as u64))
}

/// Convert a stream duration in its own time base to a [`Duration`].
pub(crate) fn stream_duration(duration: i64, time_base: Rational) -> Option<Duration> {
    if duration <= 0 || duration == NO_TIMESTAMP || time_base.denominator() == 0 {
        return None;
    }
    let seconds = pts_to_seconds(duration, time_base);
    (seconds.is_finite() && seconds > 0.0).then(|| Duration::from_secs_f64(seconds))
}
