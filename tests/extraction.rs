//! Extraction pipeline tests against the scripted backend.

mod common;

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use common::{AudioScript, ScriptedBackend, SeekOutcome, scripted_source};
use reelscan::{
    AudioFormat, CancellationToken, ExtractOptions, ExtractionError, FRAME_MIME_TYPE,
    FrameExtractor, ProgressCallback, ProgressInfo, SeekFailurePolicy, sample_timestamps,
};

const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];

#[derive(Default)]
struct RecordingProgress {
    reports: Mutex<Vec<u8>>,
}

impl RecordingProgress {
    fn percentages(&self) -> Vec<u8> {
        self.reports.lock().unwrap().clone()
    }
}

impl ProgressCallback for RecordingProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.reports.lock().unwrap().push(info.percentage);
    }
}

/// Cancels its token once `after` frames have been reported.
struct CancelAfter {
    after: u64,
    token: CancellationToken,
}

impl ProgressCallback for CancelAfter {
    fn on_progress(&self, info: &ProgressInfo) {
        if info.current >= self.after {
            self.token.cancel();
        }
    }
}

#[tokio::test]
async fn extracts_fifteen_frames_at_planned_timestamps() {
    let backend = ScriptedBackend::new(Duration::from_secs(32), 64, 48);
    let state = backend.state();
    let extractor = FrameExtractor::with_backend(backend, ExtractOptions::new());

    let result = extractor.extract(&scripted_source()).await.unwrap();

    assert_eq!(result.frames.len(), 15);
    assert_eq!(result.probe.duration, Duration::from_secs(32));

    let expected = sample_timestamps(Duration::from_secs(32), 15);
    assert_eq!(state.seeks(), expected);

    for (index, frame) in result.frames.iter().enumerate() {
        assert_eq!(frame.index, index);
        assert_eq!(frame.timestamp, expected[index]);
        assert!(frame.timestamp > Duration::ZERO);
        assert!(frame.timestamp < Duration::from_secs(32));
        assert!(!frame.placeholder);
        assert!(!frame.data.starts_with("data:"));
        assert!(frame.jpeg_bytes().unwrap().starts_with(&JPEG_MAGIC));
    }
    assert!(
        result
            .frames
            .windows(2)
            .all(|pair| pair[0].timestamp < pair[1].timestamp)
    );
}

#[tokio::test]
async fn frame_dimensions_follow_decoded_pictures() {
    let backend =
        ScriptedBackend::new(Duration::from_secs(10), 1920, 1080).with_picture_size(40, 30);
    let extractor = FrameExtractor::with_backend(backend, ExtractOptions::new());

    let result = extractor.extract(&scripted_source()).await.unwrap();

    for frame in &result.frames {
        assert_eq!((frame.width, frame.height), (40, 30));
        let decoded = image::load_from_memory(&frame.jpeg_bytes().unwrap()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (40, 30));
    }
}

#[tokio::test]
async fn progress_is_monotonic_and_ends_at_one_hundred() {
    let progress = Arc::new(RecordingProgress::default());
    let backend = ScriptedBackend::new(Duration::from_secs(20), 16, 16);
    let options = ExtractOptions::new().with_progress(progress.clone());
    let extractor = FrameExtractor::with_backend(backend, options);

    extractor.extract(&scripted_source()).await.unwrap();

    let percentages = progress.percentages();
    assert_eq!(percentages.len(), 15);
    assert!(percentages[0] > 0);
    assert_eq!(percentages[0], 7);
    assert_eq!(*percentages.last().unwrap(), 100);
    assert!(percentages.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[tokio::test]
async fn large_sample_counts_open_with_nonzero_progress() {
    let progress = Arc::new(RecordingProgress::default());
    let backend = ScriptedBackend::new(Duration::from_secs(20), 8, 8);
    let options = ExtractOptions::new()
        .with_sample_count(250)
        .with_progress(progress.clone());
    let extractor = FrameExtractor::with_backend(backend, options);

    let result = extractor.extract(&scripted_source()).await.unwrap();
    assert_eq!(result.frames.len(), 250);

    let percentages = progress.percentages();
    assert_eq!(percentages.len(), 250);
    assert!(percentages[0] > 0);
    assert_eq!(*percentages.last().unwrap(), 100);
    assert!(percentages.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[tokio::test]
async fn context_is_muted_and_released_once_on_success() {
    let backend = ScriptedBackend::new(Duration::from_secs(5), 16, 16);
    let state = backend.state();
    let extractor = FrameExtractor::with_backend(backend, ExtractOptions::new());

    extractor.extract(&scripted_source()).await.unwrap();

    assert!(state.was_muted());
    assert_eq!(state.opened(), 1);
    assert_eq!(state.released(), 1);
    assert!(!extractor.is_extracting());
}

#[tokio::test]
async fn seek_failure_aborts_and_releases_context() {
    let backend = ScriptedBackend::new(Duration::from_secs(5), 16, 16)
        .with_seek(3, SeekOutcome::Fail("corrupt packet".to_string()));
    let state = backend.state();
    let extractor = FrameExtractor::with_backend(backend, ExtractOptions::new());

    let error = extractor.extract(&scripted_source()).await.unwrap_err();

    assert!(matches!(error, ExtractionError::SeekError { .. }));
    assert_eq!(state.seeks().len(), 4);
    assert_eq!(state.released(), 1);
}

#[tokio::test]
async fn seek_without_picture_is_a_seek_error() {
    let backend = ScriptedBackend::new(Duration::from_secs(5), 16, 16)
        .with_seek(0, SeekOutcome::NoPicture);
    let extractor = FrameExtractor::with_backend(backend, ExtractOptions::new());

    let error = extractor.extract(&scripted_source()).await.unwrap_err();

    assert!(error.is_seek_failure());
}

#[tokio::test]
async fn hung_seek_times_out() {
    let backend = ScriptedBackend::new(Duration::from_secs(16), 16, 16)
        .with_seek(2, SeekOutcome::Hang);
    let state = backend.state();
    let timeout = Duration::from_millis(50);
    let options = ExtractOptions::new()
        .with_sample_count(3)
        .with_seek_timeout(Some(timeout));
    let extractor = FrameExtractor::with_backend(backend, options);

    let error = extractor.extract(&scripted_source()).await.unwrap_err();

    match error {
        ExtractionError::SeekTimeout {
            timestamp,
            timeout: expired,
        } => {
            assert_eq!(timestamp, Duration::from_secs(12));
            assert_eq!(expired, timeout);
        }
        other => panic!("expected SeekTimeout, got {other:?}"),
    }
    assert_eq!(state.released(), 1);
    assert!(!extractor.is_extracting());
}

#[tokio::test]
async fn black_frame_policy_substitutes_placeholders() {
    let backend = ScriptedBackend::new(Duration::from_secs(16), 32, 24)
        .with_seek(0, SeekOutcome::Fail("unreachable".to_string()))
        .with_seek(1, SeekOutcome::Hang);
    let options = ExtractOptions::new()
        .with_sample_count(3)
        .with_seek_timeout(Some(Duration::from_millis(50)))
        .with_seek_failure_policy(SeekFailurePolicy::BlackFrame);
    let extractor = FrameExtractor::with_backend(backend, options);

    let result = extractor.extract(&scripted_source()).await.unwrap();

    let placeholders: Vec<bool> = result.frames.iter().map(|frame| frame.placeholder).collect();
    assert_eq!(placeholders, vec![true, true, false]);
    assert_eq!((result.frames[0].width, result.frames[0].height), (32, 24));
    assert!(result.frames[0].jpeg_bytes().unwrap().starts_with(&JPEG_MAGIC));
}

#[tokio::test]
async fn probe_failure_emits_no_progress() {
    let progress = Arc::new(RecordingProgress::default());
    let backend = ScriptedBackend::new(Duration::from_secs(5), 16, 16).failing_open("not a video");
    let state = backend.state();
    let extractor =
        FrameExtractor::with_backend(backend, ExtractOptions::new().with_progress(progress.clone()));

    let error = extractor.extract(&scripted_source()).await.unwrap_err();

    assert!(matches!(error, ExtractionError::ProbeError { .. }));
    assert!(progress.percentages().is_empty());
    assert!(state.seeks().is_empty());
    assert_eq!(state.opened(), state.released());
}

#[tokio::test]
async fn zero_duration_is_a_probe_error() {
    let backend = ScriptedBackend::new(Duration::ZERO, 16, 16);
    let state = backend.state();
    let extractor = FrameExtractor::with_backend(backend, ExtractOptions::new());

    let error = extractor.extract(&scripted_source()).await.unwrap_err();

    assert!(matches!(error, ExtractionError::ProbeError { .. }));
    assert!(state.seeks().is_empty());
    assert_eq!(state.released(), 1);
}

#[tokio::test]
async fn zero_dimensions_are_a_probe_error() {
    let backend = ScriptedBackend::new(Duration::from_secs(3), 0, 0);
    let extractor = FrameExtractor::with_backend(backend, ExtractOptions::new());

    let error = extractor.extract(&scripted_source()).await.unwrap_err();

    assert!(matches!(error, ExtractionError::ProbeError { .. }));
}

#[tokio::test]
async fn hung_probe_times_out_as_probe_error() {
    let backend = ScriptedBackend::new(Duration::from_secs(3), 16, 16).hanging_probe();
    let state = backend.state();
    let options = ExtractOptions::new().with_probe_timeout(Some(Duration::from_millis(50)));
    let extractor = FrameExtractor::with_backend(backend, options);

    let error = extractor.extract(&scripted_source()).await.unwrap_err();

    match error {
        ExtractionError::ProbeError { reason, .. } => assert!(reason.contains("timed out")),
        other => panic!("expected ProbeError, got {other:?}"),
    }
    assert_eq!(state.released(), 1);
}

#[tokio::test]
async fn audio_is_empty_by_default() {
    let backend = ScriptedBackend::new(Duration::from_secs(5), 16, 16);
    let state = backend.state();
    let extractor = FrameExtractor::with_backend(backend, ExtractOptions::new());

    let result = extractor.extract(&scripted_source()).await.unwrap();

    assert!(result.audio.is_empty());
    assert_eq!(result.audio.data(), "");
    assert_eq!(state.audio_requests(), 0);
    assert_eq!(result.inline_parts().len(), 15);
}

#[tokio::test]
async fn audio_runs_after_context_release() {
    let backend = ScriptedBackend::new(Duration::from_secs(5), 16, 16)
        .with_audio(AudioScript::Bytes(vec![1, 2, 3, 4]));
    let state = backend.state();
    let options = ExtractOptions::new().with_audio(AudioFormat::Wav);
    let extractor = FrameExtractor::with_backend(backend, options);

    let result = extractor.extract(&scripted_source()).await.unwrap();

    assert!(state.released_before_audio());
    assert_eq!(result.audio.data(), "AQIDBA==");
    assert_eq!(result.audio.format(), Some(AudioFormat::Wav));

    let parts = result.inline_parts();
    assert_eq!(parts.len(), 16);
    assert_eq!(parts[0]["inlineData"]["mimeType"], FRAME_MIME_TYPE);
    assert_eq!(parts[15]["inlineData"]["mimeType"], "audio/wav");
    assert_eq!(parts[15]["inlineData"]["data"], "AQIDBA==");
}

#[tokio::test]
async fn audio_failure_never_fails_extraction() {
    let backend = ScriptedBackend::new(Duration::from_secs(5), 16, 16)
        .with_audio(AudioScript::Fail("no audio stream found".to_string()));
    let options = ExtractOptions::new().with_audio(AudioFormat::Wav);
    let extractor = FrameExtractor::with_backend(backend, options);

    let result = extractor.extract(&scripted_source()).await.unwrap();

    assert_eq!(result.frames.len(), 15);
    assert!(result.audio.is_empty());
    assert!(result.audio.format().is_none());
}

#[tokio::test]
async fn hung_audio_is_downgraded_after_timeout() {
    let backend =
        ScriptedBackend::new(Duration::from_secs(5), 16, 16).with_audio(AudioScript::Hang);
    let options = ExtractOptions::new()
        .with_audio(AudioFormat::Wav)
        .with_audio_timeout(Some(Duration::from_millis(50)));
    let extractor = FrameExtractor::with_backend(backend, options);

    let result = extractor.extract(&scripted_source()).await.unwrap();

    assert!(result.audio.is_empty());
}

#[tokio::test]
async fn cancellation_stops_sampling_and_releases_context() {
    let token = CancellationToken::new();
    let backend = ScriptedBackend::new(Duration::from_secs(5), 16, 16);
    let state = backend.state();
    let options = ExtractOptions::new()
        .with_progress(Arc::new(CancelAfter {
            after: 3,
            token: token.clone(),
        }))
        .with_cancellation(token);
    let extractor = FrameExtractor::with_backend(backend, options);

    let error = extractor.extract(&scripted_source()).await.unwrap_err();

    assert!(matches!(error, ExtractionError::Cancelled));
    assert_eq!(state.seeks().len(), 3);
    assert_eq!(state.released(), 1);
}

#[tokio::test]
async fn cancelled_before_start_opens_nothing() {
    let token = CancellationToken::new();
    token.cancel();
    let backend = ScriptedBackend::new(Duration::from_secs(5), 16, 16);
    let state = backend.state();
    let extractor =
        FrameExtractor::with_backend(backend, ExtractOptions::new().with_cancellation(token));

    let error = extractor.extract(&scripted_source()).await.unwrap_err();

    assert!(matches!(error, ExtractionError::Cancelled));
    assert_eq!(state.opened(), 0);
}

#[tokio::test]
async fn concurrent_extraction_is_rejected() {
    let backend = ScriptedBackend::new(Duration::from_secs(5), 16, 16)
        .with_seek(0, SeekOutcome::Hang);
    let state = backend.state();
    let options = ExtractOptions::new().with_seek_timeout(None);
    let extractor = FrameExtractor::with_backend(backend, options);
    let source = scripted_source();

    tokio::select! {
        biased;
        _ = extractor.extract(&source) => panic!("hung extraction completed"),
        second = extractor.extract(&source) => {
            assert!(matches!(second, Err(ExtractionError::ExtractionInProgress)));
        }
    }

    // Dropping the first future releases both the flag and the context.
    assert!(!extractor.is_extracting());
    assert_eq!(state.opened(), 1);
    assert_eq!(state.released(), 1);
}

#[tokio::test]
async fn probe_releases_context() {
    let backend = ScriptedBackend::new(Duration::from_millis(2500), 320, 240);
    let state = backend.state();
    let extractor = FrameExtractor::with_backend(backend, ExtractOptions::new());

    let info = extractor.probe(&scripted_source()).await.unwrap();

    assert_eq!(info.duration, Duration::from_millis(2500));
    assert_eq!((info.width, info.height), (320, 240));
    assert_eq!(state.released(), 1);
    assert!(state.seeks().is_empty());
}

#[test]
fn extract_blocking_runs_without_a_runtime() {
    let backend = ScriptedBackend::new(Duration::from_secs(8), 16, 16);
    let extractor =
        FrameExtractor::with_backend(backend, ExtractOptions::new().with_sample_count(3));

    let result = extractor.extract_blocking(&scripted_source()).unwrap();

    let timestamps: Vec<Duration> = result.frames.iter().map(|frame| frame.timestamp).collect();
    assert_eq!(
        timestamps,
        vec![
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_secs(6)
        ]
    );
}

#[tokio::test]
async fn repeated_extractions_are_identical() {
    let first = FrameExtractor::with_backend(
        ScriptedBackend::new(Duration::from_secs(9), 24, 16),
        ExtractOptions::new(),
    )
    .extract(&scripted_source())
    .await
    .unwrap();
    let second = FrameExtractor::with_backend(
        ScriptedBackend::new(Duration::from_secs(9), 24, 16),
        ExtractOptions::new(),
    )
    .extract(&scripted_source())
    .await
    .unwrap();

    assert_eq!(first.frames, second.frames);
}

#[tokio::test]
async fn extractor_is_reusable_after_failure() {
    let backend = ScriptedBackend::new(Duration::from_secs(4), 16, 16)
        .with_seek(0, SeekOutcome::Fail("first seek only".to_string()));
    let state = backend.state();
    let extractor = FrameExtractor::with_backend(backend, ExtractOptions::new());

    assert!(extractor.extract(&scripted_source()).await.is_err());
    assert!(!extractor.is_extracting());

    // Seek scripts are per context, so the second run opens a fresh one.
    let error = extractor.extract(&scripted_source()).await.unwrap_err();
    assert!(matches!(error, ExtractionError::SeekError { .. }));
    assert_eq!(state.opened(), 2);
    assert_eq!(state.released(), 2);
}
