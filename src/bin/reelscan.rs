use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use reelscan::{
    AudioFormat, DEFAULT_JPEG_QUALITY, DEFAULT_SAMPLE_COUNT, ExtractOptions, ExtractionResult,
    FfmpegLogLevel, FrameExtractor, ProbeInfo, ProgressCallback, ProgressInfo, SeekFailurePolicy,
    VideoSource,
};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  reelscan probe clip.mp4 --json\n  reelscan scan clip.mp4 --out frames --progress\n  reelscan scan clip.mp4 --samples 8 --quality 0.6 --audio wav --json > parts.json\n  reelscan completions zsh > _reelscan";

#[derive(Debug, Parser)]
#[command(
    name = "reelscan",
    version,
    about = "Sample evenly spaced JPEG stills from a video for multimodal requests",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show debug logging output.
    #[arg(long)]
    verbose: bool,

    /// Show a progress bar while sampling.
    #[arg(long)]
    progress: bool,

    /// Allow overwriting existing output files.
    #[arg(long)]
    overwrite: bool,

    /// FFmpeg log level (quiet, fatal, error, warning, info, debug).
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print duration and dimensions of a video.
    #[command(
        about = "Probe a video",
        after_help = "Examples:\n  reelscan probe clip.mp4\n  reelscan probe clip.mp4 --json"
    )]
    Probe {
        /// Input video path.
        input: PathBuf,

        /// Output probe info as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Sample frames (and optionally audio) from a video.
    #[command(
        about = "Sample frames from a video",
        after_help = "Examples:\n  reelscan scan clip.mp4 --out frames\n  reelscan scan clip.mp4 --json --audio wav --seek-timeout 5"
    )]
    Scan {
        /// Input video path.
        input: PathBuf,
        /// Number of evenly spaced frames to sample.
        #[arg(long, default_value_t = DEFAULT_SAMPLE_COUNT)]
        samples: usize,
        /// JPEG quality between 0.0 and 1.0.
        #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY)]
        quality: f32,
        /// Seconds to wait for each seek (0 waits forever).
        #[arg(long, default_value_t = 10.0)]
        seek_timeout: f64,
        /// Seconds to wait for opening and probing (0 waits forever).
        #[arg(long, default_value_t = 10.0)]
        probe_timeout: f64,
        /// Also extract the audio track: wav.
        #[arg(long)]
        audio: Option<String>,
        /// Substitute black frames for unreachable timestamps instead of failing.
        #[arg(long)]
        placeholder_frames: bool,
        /// Directory to write frame_NN.jpg (and the audio track) into.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Print probe info and attachment parts as JSON.
        #[arg(long)]
        json: bool,
        /// MIME type declared by the uploader.
        #[arg(long)]
        mime_type: Option<String>,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_audio_format(value: &str) -> Option<AudioFormat> {
    match value.to_ascii_lowercase().as_str() {
        "wav" | "wave" => Some(AudioFormat::Wav),
        _ => None,
    }
}

fn parse_log_level(value: &str) -> Option<FfmpegLogLevel> {
    value.parse().ok()
}

fn parse_timeout(seconds: f64, flag: &str) -> Result<Option<Duration>, Box<dyn std::error::Error>> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(format!("{flag} must be a non-negative number of seconds").into());
    }
    if seconds == 0.0 {
        return Ok(None);
    }
    let timeout = Duration::try_from_secs_f64(seconds)
        .map_err(|error| format!("{flag} is out of range: {error}"))?;
    Ok(Some(timeout))
}

fn ensure_writable_path(path: &Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        if overwrite {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("overwriting {}", path.display()).yellow()
            );
        } else {
            return Err(format!(
                "output already exists: {} (use --overwrite to replace)",
                path.display()
            )
            .into());
        }
    }
    Ok(())
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    let default_filter = if global.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Some(level) = &global.log_level {
        let parsed = parse_log_level(level).ok_or(format!("unsupported --log-level: {level}"))?;
        reelscan::set_ffmpeg_log_level(parsed);
    }

    Ok(())
}

struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new(total: usize) -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::with_template(
            "{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}",
        )?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.bar.set_length(info.total);
        self.bar.set_position(info.current);
        self.bar.set_message(format!("{}%", info.percentage));
    }
}

fn probe_json(probe: &ProbeInfo) -> serde_json::Value {
    json!({
        "duration_seconds": probe.duration.as_secs_f64(),
        "width": probe.width,
        "height": probe.height,
    })
}

fn write_outputs(
    result: &ExtractionResult,
    out: &Path,
    overwrite: bool,
) -> Result<usize, Box<dyn std::error::Error>> {
    fs::create_dir_all(out)?;

    let mut written = 0;
    for frame in &result.frames {
        let path = out.join(format!("frame_{:02}.jpg", frame.index));
        ensure_writable_path(&path, overwrite)?;
        fs::write(&path, frame.jpeg_bytes()?)?;
        written += 1;
        log::debug!("saved frame {} -> {}", frame.index, path.display());
    }

    if let Some(format) = result.audio.format() {
        let path = out.join(format!("audio.{}", format.extension()));
        ensure_writable_path(&path, overwrite)?;
        let bytes = base64_decode(result.audio.data())?;
        fs::write(&path, bytes)?;
        written += 1;
        log::debug!("saved audio -> {}", path.display());
    }

    Ok(written)
}

fn base64_decode(data: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
    Ok(BASE64_STANDARD.decode(data)?)
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Probe { input, json } => {
            let extractor = FrameExtractor::default();
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            let probe = runtime.block_on(extractor.probe(&VideoSource::from_path(&input)))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&probe_json(&probe))?);
            } else {
                println!("Duration: {:.3}s", probe.duration.as_secs_f64());
                println!("Dimensions: {}x{}", probe.width, probe.height);
            }
        }
        Commands::Scan {
            input,
            samples,
            quality,
            seek_timeout,
            probe_timeout,
            audio,
            placeholder_frames,
            out,
            json,
            mime_type,
        } => {
            if samples == 0 {
                return Err("--samples must be greater than 0".into());
            }
            if !(0.0..=1.0).contains(&quality) {
                return Err("--quality must be between 0.0 and 1.0".into());
            }

            let mut options = ExtractOptions::new()
                .with_sample_count(samples)
                .with_jpeg_quality(quality)
                .with_seek_timeout(parse_timeout(seek_timeout, "--seek-timeout")?)
                .with_probe_timeout(parse_timeout(probe_timeout, "--probe-timeout")?);

            if let Some(audio) = &audio {
                let format =
                    parse_audio_format(audio).ok_or(format!("unsupported --audio format: {audio}"))?;
                options = options.with_audio(format);
            }
            if placeholder_frames {
                options = options.with_seek_failure_policy(SeekFailurePolicy::BlackFrame);
            }

            let progress = if cli.global.progress {
                let progress = Arc::new(TerminalProgress::new(samples)?);
                options = options.with_progress(progress.clone());
                Some(progress)
            } else {
                None
            };

            let mut source = VideoSource::from_path(&input);
            if let Some(mime_type) = mime_type {
                source = source.with_mime_type(mime_type);
            }

            let result = FrameExtractor::new(options).extract_blocking(&source)?;

            if let Some(progress) = progress {
                progress.bar.finish_with_message("done");
            }

            if let Some(out) = &out {
                let written = write_outputs(&result, out, cli.global.overwrite)?;
                eprintln!(
                    "{} {}",
                    "success:".green().bold(),
                    format!("Wrote {written} file(s) to {}", out.display()).green()
                );
            }

            if json {
                let payload = json!({
                    "probe": probe_json(&result.probe),
                    "frames": result.frames.iter().map(|frame| json!({
                        "index": frame.index,
                        "timestamp_seconds": frame.timestamp.as_secs_f64(),
                        "width": frame.width,
                        "height": frame.height,
                        "placeholder": frame.placeholder,
                    })).collect::<Vec<_>>(),
                    "audio": result.audio.format().map(|format| format.mime_type()),
                    "parts": result.inline_parts(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else if out.is_none() {
                for frame in &result.frames {
                    println!(
                        "{:>3}  {:>9.3}s  {}x{}  {} bytes{}",
                        frame.index,
                        frame.timestamp.as_secs_f64(),
                        frame.width,
                        frame.height,
                        frame.data.len(),
                        if frame.placeholder { "  (placeholder)" } else { "" }
                    );
                }
                println!(
                    "{} {}",
                    "success:".green().bold(),
                    format!(
                        "Sampled {} frame(s){}",
                        result.frames.len(),
                        if result.audio.is_empty() { "" } else { " and audio" }
                    )
                    .green()
                );
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "reelscan", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}
