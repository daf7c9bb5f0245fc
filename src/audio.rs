//! Audio side-channel transcoding.
//!
//! This module provides [`AudioFormat`] and the FFmpeg routine that decodes a
//! source's best audio track and muxes it into an in-memory container. The
//! orchestrator treats every failure here as "no audio available".

use std::{
    ffi::CString,
    fmt::{Display, Formatter, Result as FmtResult},
    path::Path,
};

use ffmpeg_next::{
    ChannelLayout, Packet, Rational,
    codec::{Id, context::Context as CodecContext},
    decoder::Audio as AudioDecoder,
    encoder::Audio as AudioEncoder,
    format::{Sample, sample::Type as SampleType},
    frame::Audio as AudioFrame,
    media::Type,
    packet::Mut as _,
    software::resampling::Context as ResamplingContext,
};
use ffmpeg_sys_next::{AVFormatContext, AVRational};

use crate::error::ExtractionError;

/// Audio side-channel output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum AudioFormat {
    /// WAV (PCM signed 16-bit little-endian) at the source rate and layout.
    Wav,
}

impl Display for AudioFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AudioFormat::Wav => write!(f, "WAV"),
        }
    }
}

impl AudioFormat {
    /// MIME type of the encoded payload.
    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "audio/wav",
        }
    }

    /// Conventional file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
        }
    }

    fn container_name(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
        }
    }

    fn codec_id(&self) -> Id {
        match self {
            AudioFormat::Wav => Id::PCM_S16LE,
        }
    }
}

fn audio_error<E: Display>(error: E) -> ExtractionError {
    ExtractionError::AudioDecodeError(error.to_string())
}

/// Decode the best audio track at `path` and encode it as `format` in memory.
///
/// Blocking; run it on a blocking thread.
pub(crate) fn transcode_track(path: &Path, format: AudioFormat) -> Result<Vec<u8>, ExtractionError> {
    ffmpeg_next::init().map_err(audio_error)?;

    let mut input_context = ffmpeg_next::format::input(&path).map_err(audio_error)?;

    let (audio_stream_index, codec_parameters) = {
        let stream = input_context
            .streams()
            .best(Type::Audio)
            .ok_or_else(|| audio_error("no audio stream found"))?;
        (stream.index(), stream.parameters())
    };

    let mut decoder = CodecContext::from_parameters(codec_parameters)
        .and_then(|context| context.decoder().audio())
        .map_err(audio_error)?;

    log::debug!(
        "Transcoding audio stream {} of {} to {} at {} Hz",
        audio_stream_index,
        path.display(),
        format,
        decoder.rate(),
    );

    let output_codec = ffmpeg_next::encoder::find(format.codec_id())
        .ok_or_else(|| audio_error(format!("no {format} encoder available")))?;
    let output_sample_format = output_codec
        .audio()
        .ok()
        .and_then(|audio_codec| audio_codec.formats())
        .and_then(|mut formats| formats.next())
        .unwrap_or(Sample::I16(SampleType::Packed));
    let output_sample_rate = decoder.rate();
    let output_channel_layout = decoder.channel_layout();

    let (encoder, encoder_time_base) = open_encoder(
        output_codec,
        output_sample_format,
        output_sample_rate,
        output_channel_layout,
    )?;

    let mut output = MemoryOutput::new(format.container_name())?;
    output.add_stream(&encoder, encoder_time_base)?;
    output.write_header()?;

    let resampler = ResamplingContext::get(
        decoder.format(),
        decoder.channel_layout(),
        decoder.rate(),
        output_sample_format,
        output_channel_layout,
        output_sample_rate,
    )
    .map_err(audio_error)?;

    let mut pipeline = EncodePipeline {
        resampler,
        encoder,
        time_base: encoder_time_base,
        samples_written: 0,
        decoded: AudioFrame::empty(),
        resampled: AudioFrame::empty(),
        packet: Packet::empty(),
    };

    for (stream, packet) in input_context.packets() {
        if stream.index() != audio_stream_index {
            continue;
        }
        decoder.send_packet(&packet).map_err(audio_error)?;
        pipeline.drain_decoder(&mut decoder, &mut output)?;
    }

    let _ = decoder.send_eof();
    pipeline.drain_decoder(&mut decoder, &mut output)?;
    pipeline.flush(&mut output)?;

    output.finish()
}

fn open_encoder(
    codec: ffmpeg_next::Codec,
    sample_format: Sample,
    sample_rate: u32,
    channel_layout: ChannelLayout,
) -> Result<(AudioEncoder, Rational), ExtractionError> {
    let mut encoder_context = CodecContext::new()
        .encoder()
        .audio()
        .map_err(audio_error)?;

    let time_base = Rational(1, sample_rate as i32);
    encoder_context.set_rate(sample_rate as i32);
    encoder_context.set_channel_layout(channel_layout);
    encoder_context.set_format(sample_format);
    encoder_context.set_time_base(time_base);

    let encoder = encoder_context.open_as(codec).map_err(audio_error)?;
    Ok((encoder, time_base))
}

/// Decode -> resample -> encode state for one track.
struct EncodePipeline {
    resampler: ResamplingContext,
    encoder: AudioEncoder,
    time_base: Rational,
    samples_written: i64,
    decoded: AudioFrame,
    resampled: AudioFrame,
    packet: Packet,
}

impl EncodePipeline {
    fn drain_decoder(
        &mut self,
        decoder: &mut AudioDecoder,
        output: &mut MemoryOutput,
    ) -> Result<(), ExtractionError> {
        while decoder.receive_frame(&mut self.decoded).is_ok() {
            self.resampler
                .run(&self.decoded, &mut self.resampled)
                .map_err(audio_error)?;

            self.resampled.set_pts(Some(self.samples_written));
            self.samples_written += self.resampled.samples() as i64;

            self.encoder
                .send_frame(&self.resampled)
                .map_err(audio_error)?;
            self.drain_encoder(output)?;
        }
        Ok(())
    }

    fn drain_encoder(&mut self, output: &mut MemoryOutput) -> Result<(), ExtractionError> {
        while self.encoder.receive_packet(&mut self.packet).is_ok() {
            self.packet.set_stream(0);
            self.packet.rescale_ts(self.time_base, self.time_base);
            output.write_packet(&mut self.packet)?;
        }
        Ok(())
    }

    fn flush(&mut self, output: &mut MemoryOutput) -> Result<(), ExtractionError> {
        let _ = self.encoder.send_eof();
        self.drain_encoder(output)
    }
}

/// An output format context muxing into FFmpeg's dynamic memory buffer.
///
/// Owns the `AVFormatContext` and its dynamic buffer until
/// [`finish`](MemoryOutput::finish) hands the bytes out; dropping an
/// unfinished output frees both.
struct MemoryOutput {
    context: *mut AVFormatContext,
}

impl MemoryOutput {
    fn new(container_name: &str) -> Result<Self, ExtractionError> {
        let container_name_c = CString::new(container_name).map_err(audio_error)?;
        let mut context: *mut AVFormatContext = std::ptr::null_mut();

        // SAFETY: `context` is an out-pointer; on success FFmpeg stores a
        // freshly allocated context we take ownership of.
        let allocation_result = unsafe {
            ffmpeg_sys_next::avformat_alloc_output_context2(
                &mut context,
                std::ptr::null_mut(),
                container_name_c.as_ptr(),
                std::ptr::null(),
            )
        };
        if allocation_result < 0 || context.is_null() {
            return Err(audio_error("failed to allocate output format context"));
        }

        // SAFETY: `context` is a valid, exclusively owned context.
        let buffer_result = unsafe { ffmpeg_sys_next::avio_open_dyn_buf(&mut (*context).pb) };
        if buffer_result < 0 {
            // SAFETY: no buffer was attached; only the context needs freeing.
            unsafe { ffmpeg_sys_next::avformat_free_context(context) };
            return Err(audio_error("failed to open dynamic buffer for audio output"));
        }

        Ok(Self { context })
    }

    fn add_stream(
        &mut self,
        encoder: &AudioEncoder,
        time_base: Rational,
    ) -> Result<(), ExtractionError> {
        // SAFETY: `self.context` is valid; the new stream is owned by it.
        unsafe {
            let stream = ffmpeg_sys_next::avformat_new_stream(self.context, std::ptr::null());
            if stream.is_null() {
                return Err(audio_error("failed to add output stream"));
            }
            ffmpeg_sys_next::avcodec_parameters_from_context((*stream).codecpar, encoder.as_ptr());
            (*stream).time_base = AVRational {
                num: time_base.numerator(),
                den: time_base.denominator(),
            };
        }
        Ok(())
    }

    fn write_header(&mut self) -> Result<(), ExtractionError> {
        // SAFETY: `self.context` is valid and has its stream configured.
        let result =
            unsafe { ffmpeg_sys_next::avformat_write_header(self.context, std::ptr::null_mut()) };
        if result < 0 {
            return Err(audio_error("failed to write output header"));
        }
        Ok(())
    }

    fn write_packet(&mut self, packet: &mut Packet) -> Result<(), ExtractionError> {
        // SAFETY: `self.context` is valid and its header has been written.
        let result = unsafe {
            ffmpeg_sys_next::av_interleaved_write_frame(self.context, packet.as_mut_ptr())
        };
        if result < 0 {
            return Err(audio_error(format!("failed to write audio packet ({result})")));
        }
        Ok(())
    }

    /// Write the trailer and take the muxed bytes.
    fn finish(mut self) -> Result<Vec<u8>, ExtractionError> {
        // SAFETY: `self.context` is valid; after this block it is freed and
        // nulled so `Drop` does nothing.
        unsafe {
            let trailer_result = ffmpeg_sys_next::av_write_trailer(self.context);
            let bytes = self.take_buffer();
            ffmpeg_sys_next::avformat_free_context(self.context);
            self.context = std::ptr::null_mut();

            if trailer_result < 0 {
                return Err(audio_error("failed to write output trailer"));
            }
            Ok(bytes)
        }
    }

    /// Close the dynamic buffer and copy its contents out.
    ///
    /// # Safety
    ///
    /// `self.context` must be valid with an open dynamic buffer.
    unsafe fn take_buffer(&mut self) -> Vec<u8> {
        let mut buffer_pointer: *mut u8 = std::ptr::null_mut();
        // SAFETY: upheld by the caller.
        unsafe {
            let buffer_size =
                ffmpeg_sys_next::avio_close_dyn_buf((*self.context).pb, &mut buffer_pointer);
            (*self.context).pb = std::ptr::null_mut();

            let bytes = if buffer_size > 0 && !buffer_pointer.is_null() {
                std::slice::from_raw_parts(buffer_pointer, buffer_size as usize).to_vec()
            } else {
                Vec::new()
            };
            if !buffer_pointer.is_null() {
                ffmpeg_sys_next::av_free(buffer_pointer as *mut _);
            }
            bytes
        }
    }
}

impl Drop for MemoryOutput {
    fn drop(&mut self) {
        if self.context.is_null() {
            return;
        }
        // SAFETY: an unfinished output still owns its context and buffer.
        unsafe {
            let _ = self.take_buffer();
            ffmpeg_sys_next::avformat_free_context(self.context);
        }
    }
}
