//! Benchmarks for timestamp planning and end-to-end frame sampling.
//!
//! Run with: cargo bench
//!
//! The FFmpeg benchmarks require fixture files from
//! `tests/fixtures/generate_fixtures.sh`.

use std::{path::Path, time::Duration};

use criterion::Criterion;
use reelscan::{
    AudioFormat, ExtractOptions, FfmpegLogLevel, FrameExtractor, VideoSource, sample_timestamps,
};

const SAMPLE_VIDEO: &str = "tests/fixtures/sample_video.mp4";

fn benchmark_timestamp_planning(criterion: &mut Criterion) {
    criterion.bench_function("plan 15 timestamps", |bencher| {
        bencher.iter(|| sample_timestamps(std::hint::black_box(Duration::from_secs(95)), 15));
    });
}

fn benchmark_probe(criterion: &mut Criterion) {
    reelscan::set_ffmpeg_log_level(FfmpegLogLevel::Error);

    if !Path::new(SAMPLE_VIDEO).exists() {
        eprintln!("Skipping benchmark: fixture not found");
        return;
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let extractor = FrameExtractor::default();
    let source = VideoSource::from_path(SAMPLE_VIDEO);

    criterion.bench_function("probe", |bencher| {
        bencher.iter(|| runtime.block_on(extractor.probe(&source)).unwrap());
    });
}

fn benchmark_sampling(criterion: &mut Criterion) {
    if !Path::new(SAMPLE_VIDEO).exists() {
        return;
    }

    let source = VideoSource::from_path(SAMPLE_VIDEO);
    let mut group = criterion.benchmark_group("sampling");
    group.sample_size(10);

    let default_extractor = FrameExtractor::default();
    group.bench_function("15 frames at quality 0.4", |bencher| {
        bencher.iter(|| default_extractor.extract_blocking(&source).unwrap());
    });

    let high_quality = FrameExtractor::new(ExtractOptions::new().with_jpeg_quality(0.9));
    group.bench_function("15 frames at quality 0.9", |bencher| {
        bencher.iter(|| high_quality.extract_blocking(&source).unwrap());
    });

    let with_audio = FrameExtractor::new(ExtractOptions::new().with_audio(AudioFormat::Wav));
    group.bench_function("15 frames with WAV audio", |bencher| {
        bencher.iter(|| with_audio.extract_blocking(&source).unwrap());
    });

    group.finish();
}

criterion::criterion_group!(
    benches,
    benchmark_timestamp_planning,
    benchmark_probe,
    benchmark_sampling,
);
criterion::criterion_main!(benches);
