//! The frame-sampling stage.

use std::time::Duration;

use crate::{
    artifact::FrameArtifact,
    backend::DecodeContext,
    configuration::{ExtractOptions, SeekFailurePolicy},
    error::ExtractionError,
    probe::ProbeInfo,
    progress::{OperationType, ProgressTracker},
    raster::RasterSurface,
    sampling::sample_timestamps,
};

/// Seek to each planned timestamp in order and encode what the decoder shows.
///
/// Frames are processed strictly one after another: a seek is only issued
/// once the previous frame has been encoded. Progress is reported after every
/// frame.
pub(crate) async fn sample_frames<C: DecodeContext>(
    context: &mut C,
    probe: &ProbeInfo,
    options: &ExtractOptions,
) -> Result<Vec<FrameArtifact>, ExtractionError> {
    let timestamps = sample_timestamps(probe.duration, options.sample_count());
    let total = timestamps.len();
    let quality = options.jpeg_quality_percent();

    let mut surface = RasterSurface::new();
    let mut tracker = ProgressTracker::new(
        options.progress.clone(),
        OperationType::FrameSampling,
        total as u64,
    );
    let mut frames = Vec::with_capacity(total);

    for (index, timestamp) in timestamps.into_iter().enumerate() {
        if options.is_cancelled() {
            return Err(ExtractionError::Cancelled);
        }

        let placeholder = match seek_and_draw(context, &mut surface, timestamp, options).await {
            Ok(()) => false,
            Err(error) if error.is_seek_failure() => match options.seek_failure_policy() {
                SeekFailurePolicy::Abort => return Err(error),
                SeekFailurePolicy::BlackFrame => {
                    log::warn!("Frame {index}: {error}; substituting a black frame");
                    if surface.dimensions() == (0, 0) {
                        surface.configure(probe.width, probe.height);
                    }
                    surface.clear();
                    true
                }
            },
            Err(error) => return Err(error),
        };

        let data = surface
            .encode_jpeg_base64(quality)
            .map_err(|reason| ExtractionError::EncodeError { index, reason })?;
        let (width, height) = surface.dimensions();

        log::debug!(
            "Sampled frame {}/{} at {:.3}s ({width}x{height}, {} base64 bytes)",
            index + 1,
            total,
            timestamp.as_secs_f64(),
            data.len()
        );

        frames.push(FrameArtifact {
            index,
            timestamp,
            width,
            height,
            data,
            placeholder,
        });
        tracker.advance(Some(timestamp));
    }

    Ok(frames)
}

async fn seek_and_draw<C: DecodeContext>(
    context: &mut C,
    surface: &mut RasterSurface,
    timestamp: Duration,
    options: &ExtractOptions,
) -> Result<(), ExtractionError> {
    match options.seek_timeout() {
        Some(timeout) => tokio::time::timeout(timeout, context.seek(timestamp))
            .await
            .map_err(|_| ExtractionError::SeekTimeout { timestamp, timeout })??,
        None => context.seek(timestamp).await?,
    }

    let picture = context
        .current_picture()
        .ok_or_else(|| ExtractionError::SeekError {
            timestamp,
            reason: "seek completed without a displayable frame".to_string(),
        })?;

    surface.configure(picture.width(), picture.height());
    surface.draw(picture)
}
