//! FFmpeg-backed decoding.
//!
//! [`FfmpegBackend`] opens every source on a dedicated decoder thread that
//! owns the demuxer, the video decoder and the pixel-format converter. The
//! async side talks to it through [`FfmpegContext`]: each request is queued on
//! a channel and answered on a oneshot, so a seek that never completes can be
//! abandoned by the caller without blocking the runtime. Dropping the context
//! raises a release flag that FFmpeg's I/O interrupt callback observes, so a
//! pending open, seek or read aborts and the thread closes the file at once.

use std::{
    path::{Path, PathBuf},
    sync::{
        Arc, mpsc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use ffmpeg_next::{
    Error as FfmpegError, Packet, Rational,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use ffmpeg_sys_next::AVDiscard;
use tokio::sync::oneshot;

use crate::{
    audio::{self, AudioFormat},
    backend::{DecodeContext, MediaBackend},
    conversion::{
        NO_TIMESTAMP, container_duration, frame_to_rgb_buffer, pts_to_seconds, seek_position,
        stream_duration,
    },
    error::ExtractionError,
    probe::ProbeInfo,
    raster::Picture,
    source::VideoSource,
};

/// A decoded frame counts as "at" the target when it is this close before it.
const LANDING_TOLERANCE_SECONDS: f64 = 0.001;

/// The FFmpeg media backend.
///
/// Audio side-channels are transcoded with [`tokio::task::spawn_blocking`],
/// so [`decode_audio`](MediaBackend::decode_audio) must run inside a Tokio
/// runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegBackend;

impl MediaBackend for FfmpegBackend {
    type Context = FfmpegContext;

    async fn open(&self, source: &VideoSource) -> Result<FfmpegContext, ExtractionError> {
        let path = source.path().to_path_buf();
        log::debug!("Opening decode context for {}", path.display());

        let (request_sender, request_receiver) = mpsc::channel();
        let (ready_sender, ready_receiver) = oneshot::channel();
        let release = ReleaseFlag::default();

        let worker_path = path.clone();
        let released = release.observer();
        thread::Builder::new()
            .name("reelscan-decoder".to_string())
            .spawn(move || match DecodeWorker::open(&worker_path, released) {
                Ok(worker) => {
                    if ready_sender.send(Ok(())).is_ok() {
                        worker.run(request_receiver);
                    }
                }
                Err(error) => {
                    let _ = ready_sender.send(Err(error));
                }
            })?;

        ready_receiver
            .await
            .map_err(|_| source.probe_error("decoder thread exited before opening the source"))??;

        Ok(FfmpegContext {
            path,
            requests: request_sender,
            current: None,
            _release: release,
        })
    }

    async fn decode_audio(
        &self,
        source: &VideoSource,
        format: AudioFormat,
    ) -> Result<Vec<u8>, ExtractionError> {
        let path = source.path().to_path_buf();
        tokio::task::spawn_blocking(move || audio::transcode_track(&path, format))
            .await
            .map_err(|error| ExtractionError::AudioDecodeError(error.to_string()))?
    }
}

enum Request {
    SetMuted(bool),
    Probe(oneshot::Sender<Result<ProbeInfo, ExtractionError>>),
    Seek {
        timestamp: Duration,
        reply: oneshot::Sender<Result<Picture, ExtractionError>>,
    },
}

/// Raised when its owner is dropped.
///
/// The decoder thread polls the observer from FFmpeg's interrupt callback and
/// between packets.
#[derive(Debug, Default)]
struct ReleaseFlag(Arc<AtomicBool>);

impl ReleaseFlag {
    fn observer(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}

impl Drop for ReleaseFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Handle to a source opened by [`FfmpegBackend`].
pub struct FfmpegContext {
    path: PathBuf,
    requests: mpsc::Sender<Request>,
    current: Option<Picture>,
    _release: ReleaseFlag,
}

impl FfmpegContext {
    /// Path of the source this context decodes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dispatch<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Request,
    ) -> Option<oneshot::Receiver<T>> {
        let (reply, receiver) = oneshot::channel();
        self.requests.send(build(reply)).ok().map(|()| receiver)
    }

    fn probe_error(&self, reason: &str) -> ExtractionError {
        ExtractionError::ProbeError {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

impl DecodeContext for FfmpegContext {
    fn set_muted(&mut self, muted: bool) {
        if self.requests.send(Request::SetMuted(muted)).is_err() {
            log::debug!("Decoder thread for {} is gone", self.path.display());
        }
    }

    async fn probe(&mut self) -> Result<ProbeInfo, ExtractionError> {
        let receiver = self
            .dispatch(Request::Probe)
            .ok_or_else(|| self.probe_error("decoder thread is gone"))?;
        receiver
            .await
            .map_err(|_| self.probe_error("decoder thread exited while probing"))?
    }

    async fn seek(&mut self, timestamp: Duration) -> Result<(), ExtractionError> {
        self.current = None;
        let worker_gone = || ExtractionError::SeekError {
            timestamp,
            reason: "decoder thread is gone".to_string(),
        };

        let receiver = self
            .dispatch(|reply| Request::Seek { timestamp, reply })
            .ok_or_else(worker_gone)?;
        let picture = receiver.await.map_err(|_| worker_gone())??;

        self.current = Some(picture);
        Ok(())
    }

    fn current_picture(&self) -> Option<&Picture> {
        self.current.as_ref()
    }
}

impl Drop for FfmpegContext {
    fn drop(&mut self) {
        log::debug!("Releasing decode context for {}", self.path.display());
    }
}

/// State owned by the decoder thread.
struct DecodeWorker {
    path: PathBuf,
    input: Input,
    video_stream_index: usize,
    time_base: Rational,
    start_seconds: f64,
    decoder: VideoDecoder,
    scaler: Option<((Pixel, u32, u32), ScalingContext)>,
    released: Arc<AtomicBool>,
}

impl DecodeWorker {
    fn open(path: &Path, released: Arc<AtomicBool>) -> Result<Self, ExtractionError> {
        let probe_error = |reason: String| ExtractionError::ProbeError {
            path: path.to_path_buf(),
            reason,
        };

        ffmpeg_next::init()
            .map_err(|error| probe_error(format!("FFmpeg initialisation failed: {error}")))?;

        let interrupt = Arc::clone(&released);
        let input = ffmpeg_next::format::input_with_interrupt(&path, move || {
            interrupt.load(Ordering::Acquire)
        })
        .map_err(|error| probe_error(error.to_string()))?;

        let (video_stream_index, time_base, start_time, codec_parameters) = {
            let stream = input
                .streams()
                .best(Type::Video)
                .ok_or_else(|| probe_error("no video stream found".to_string()))?;
            (
                stream.index(),
                stream.time_base(),
                stream.start_time(),
                stream.parameters(),
            )
        };

        let decoder = CodecContext::from_parameters(codec_parameters)
            .and_then(|context| context.decoder().video())
            .map_err(|error| probe_error(format!("failed to create video decoder: {error}")))?;

        let start_seconds = if start_time == NO_TIMESTAMP {
            0.0
        } else {
            pts_to_seconds(start_time, time_base)
        };

        log::debug!(
            "Opened {} (video stream {}, {:?}, {}x{})",
            path.display(),
            video_stream_index,
            decoder.id(),
            decoder.width(),
            decoder.height()
        );

        Ok(Self {
            path: path.to_path_buf(),
            input,
            video_stream_index,
            time_base,
            start_seconds,
            decoder,
            scaler: None,
            released,
        })
    }

    fn run(mut self, requests: mpsc::Receiver<Request>) {
        for request in requests {
            if self.released.load(Ordering::Acquire) {
                break;
            }
            match request {
                Request::SetMuted(muted) => self.set_muted(muted),
                Request::Probe(reply) => {
                    let _ = reply.send(self.probe());
                }
                Request::Seek { timestamp, reply } => {
                    let _ = reply.send(self.seek(timestamp));
                }
            }
        }
        log::debug!("Decoder thread for {} finished", self.path.display());
    }

    fn set_muted(&mut self, muted: bool) {
        let audio_stream_indices: Vec<usize> = self
            .input
            .streams()
            .filter(|stream| stream.parameters().medium() == Type::Audio)
            .map(|stream| stream.index())
            .collect();

        let discard = if muted {
            AVDiscard::AVDISCARD_ALL
        } else {
            AVDiscard::AVDISCARD_DEFAULT
        };

        for index in audio_stream_indices {
            if let Some(mut stream) = self.input.stream_mut(index) {
                // SAFETY: the stream belongs to `self.input`, which is only
                // touched from this thread.
                unsafe { (*stream.as_mut_ptr()).discard = discard };
            }
        }
    }

    fn probe(&self) -> Result<ProbeInfo, ExtractionError> {
        let stream_length = self
            .input
            .stream(self.video_stream_index)
            .and_then(|stream| stream_duration(stream.duration(), stream.time_base()));

        let duration = container_duration(self.input.duration())
            .or(stream_length)
            .ok_or_else(|| ExtractionError::ProbeError {
                path: self.path.clone(),
                reason: "video duration is unknown".to_string(),
            })?;

        Ok(ProbeInfo::new(
            duration,
            self.decoder.width(),
            self.decoder.height(),
        ))
    }

    /// Seek to `timestamp` and rasterize the first frame at or after it.
    ///
    /// Falls back to the last decodable frame when the stream ends first.
    fn seek(&mut self, timestamp: Duration) -> Result<Picture, ExtractionError> {
        let seek_error = |reason: String| ExtractionError::SeekError { timestamp, reason };
        let target = timestamp.as_secs_f64() - LANDING_TOLERANCE_SECONDS;
        let (time_base, start_seconds) = (self.time_base, self.start_seconds);

        let position = seek_position(timestamp, start_seconds);
        self.input
            .seek(position, ..position)
            .map_err(|error| seek_error(error.to_string()))?;
        self.decoder.flush();

        let mut current = VideoFrame::empty();
        let mut previous = VideoFrame::empty();
        let mut decoded_any = false;
        let mut landed = false;

        'demux: loop {
            if self.released.load(Ordering::Acquire) {
                return Err(seek_error("decode context was released".to_string()));
            }
            let mut packet = Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {}
                Err(FfmpegError::Eof) => break,
                Err(FfmpegError::Exit) => {
                    return Err(seek_error("decode context was released".to_string()));
                }
                // Non-fatal read error; a stuck reader is ended by the release flag.
                Err(_) => continue,
            }
            if packet.stream() != self.video_stream_index {
                continue;
            }
            if let Err(error) = self.decoder.send_packet(&packet) {
                log::debug!("Skipping undecodable packet near {timestamp:?}: {error}");
                continue;
            }
            while self.decoder.receive_frame(&mut current).is_ok() {
                decoded_any = true;
                if frame_reaches(&current, time_base, start_seconds, target) {
                    landed = true;
                    break 'demux;
                }
                std::mem::swap(&mut current, &mut previous);
            }
        }

        if !landed {
            let _ = self.decoder.send_eof();
            while self.decoder.receive_frame(&mut current).is_ok() {
                decoded_any = true;
                if frame_reaches(&current, time_base, start_seconds, target) {
                    landed = true;
                    break;
                }
                std::mem::swap(&mut current, &mut previous);
            }
        }

        let frame = if landed {
            &current
        } else if decoded_any {
            log::debug!("Stream ended before {timestamp:?}; using the last decoded frame");
            &previous
        } else {
            return Err(seek_error("no frame could be decoded".to_string()));
        };

        self.rasterize(frame)
    }

    /// Convert a decoded frame to RGB24 at its native size.
    fn rasterize(&mut self, frame: &VideoFrame) -> Result<Picture, ExtractionError> {
        let key = (frame.format(), frame.width(), frame.height());
        let (format, width, height) = key;

        let mut scaler = match self.scaler.take() {
            Some((cached, scaler)) if cached == key => scaler,
            _ => ScalingContext::get(
                format,
                width,
                height,
                Pixel::RGB24,
                width,
                height,
                ScalingFlags::BILINEAR,
            )
            .map_err(|error| ExtractionError::VideoDecodeError(error.to_string()))?,
        };

        let mut rgb_frame = VideoFrame::empty();
        let converted = scaler.run(frame, &mut rgb_frame);
        self.scaler = Some((key, scaler));
        converted.map_err(|error| ExtractionError::VideoDecodeError(error.to_string()))?;

        Picture::new(width, height, frame_to_rgb_buffer(&rgb_frame, width, height))
    }
}

/// Whether a decoded frame is at or past `target_seconds` on the stream clock.
///
/// Frames without any timestamp are accepted as they come.
fn frame_reaches(
    frame: &VideoFrame,
    time_base: Rational,
    start_seconds: f64,
    target_seconds: f64,
) -> bool {
    match frame.timestamp().or(frame.pts()) {
        Some(pts) => pts_to_seconds(pts, time_base) - start_seconds >= target_seconds,
        None => true,
    }
}
