//! A scripted, in-process media backend.
//!
//! Every seek lands on a solid-colour picture unless the script says
//! otherwise, so extraction behavior can be checked without FFmpeg or fixture
//! files.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use reelscan::{
    AudioFormat, DecodeContext, ExtractionError, MediaBackend, Picture, ProbeInfo, VideoSource,
};

/// What the `n`th seek of a context does.
#[derive(Debug, Clone)]
pub enum SeekOutcome {
    Land,
    Fail(String),
    Hang,
    NoPicture,
}

/// What the audio side-channel does.
#[derive(Debug, Clone)]
pub enum AudioScript {
    Bytes(Vec<u8>),
    Fail(String),
    Hang,
}

/// Observations shared between the backend, its contexts and the test.
#[derive(Debug, Default)]
pub struct BackendState {
    opened: AtomicUsize,
    released: AtomicUsize,
    muted: AtomicBool,
    audio_requests: AtomicUsize,
    released_before_audio: AtomicBool,
    seeks: Mutex<Vec<Duration>>,
}

impl BackendState {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn was_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    pub fn audio_requests(&self) -> usize {
        self.audio_requests.load(Ordering::SeqCst)
    }

    pub fn released_before_audio(&self) -> bool {
        self.released_before_audio.load(Ordering::SeqCst)
    }

    pub fn seeks(&self) -> Vec<Duration> {
        self.seeks.lock().unwrap().clone()
    }
}

pub struct ScriptedBackend {
    state: Arc<BackendState>,
    probe: ProbeInfo,
    picture_size: (u32, u32),
    seeks: HashMap<usize, SeekOutcome>,
    open_failure: Option<String>,
    hanging_probe: bool,
    audio: AudioScript,
}

impl ScriptedBackend {
    pub fn new(duration: Duration, width: u32, height: u32) -> Self {
        Self {
            state: Arc::new(BackendState::default()),
            probe: ProbeInfo::new(duration, width, height),
            picture_size: (width, height),
            seeks: HashMap::new(),
            open_failure: None,
            hanging_probe: false,
            audio: AudioScript::Bytes(b"RIFF....WAVEfmt ".to_vec()),
        }
    }

    /// Decoded pictures use this size regardless of what the probe reports.
    pub fn with_picture_size(mut self, width: u32, height: u32) -> Self {
        self.picture_size = (width, height);
        self
    }

    pub fn with_seek(mut self, index: usize, outcome: SeekOutcome) -> Self {
        self.seeks.insert(index, outcome);
        self
    }

    pub fn failing_open(mut self, reason: &str) -> Self {
        self.open_failure = Some(reason.to_string());
        self
    }

    pub fn hanging_probe(mut self) -> Self {
        self.hanging_probe = true;
        self
    }

    pub fn with_audio(mut self, audio: AudioScript) -> Self {
        self.audio = audio;
        self
    }

    pub fn state(&self) -> Arc<BackendState> {
        self.state.clone()
    }
}

impl MediaBackend for ScriptedBackend {
    type Context = ScriptedContext;

    async fn open(&self, source: &VideoSource) -> Result<ScriptedContext, ExtractionError> {
        if let Some(reason) = &self.open_failure {
            return Err(source.probe_error(reason.clone()));
        }
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedContext {
            state: self.state.clone(),
            probe: self.probe,
            picture_size: self.picture_size,
            seeks: self.seeks.clone(),
            hanging_probe: self.hanging_probe,
            seek_count: 0,
            current: None,
        })
    }

    async fn decode_audio(
        &self,
        _source: &VideoSource,
        _format: AudioFormat,
    ) -> Result<Vec<u8>, ExtractionError> {
        self.state.audio_requests.fetch_add(1, Ordering::SeqCst);
        self.state
            .released_before_audio
            .store(self.state.opened() == self.state.released(), Ordering::SeqCst);
        match &self.audio {
            AudioScript::Bytes(bytes) => Ok(bytes.clone()),
            AudioScript::Fail(reason) => Err(ExtractionError::AudioDecodeError(reason.clone())),
            AudioScript::Hang => std::future::pending().await,
        }
    }
}

pub struct ScriptedContext {
    state: Arc<BackendState>,
    probe: ProbeInfo,
    picture_size: (u32, u32),
    seeks: HashMap<usize, SeekOutcome>,
    hanging_probe: bool,
    seek_count: usize,
    current: Option<Picture>,
}

impl DecodeContext for ScriptedContext {
    fn set_muted(&mut self, muted: bool) {
        self.state.muted.store(muted, Ordering::SeqCst);
    }

    async fn probe(&mut self) -> Result<ProbeInfo, ExtractionError> {
        if self.hanging_probe {
            return std::future::pending().await;
        }
        Ok(self.probe)
    }

    async fn seek(&mut self, timestamp: Duration) -> Result<(), ExtractionError> {
        let index = self.seek_count;
        self.seek_count += 1;
        self.current = None;
        self.state.seeks.lock().unwrap().push(timestamp);

        match self.seeks.get(&index).cloned().unwrap_or(SeekOutcome::Land) {
            SeekOutcome::Land => {
                let (width, height) = self.picture_size;
                let shade = (index * 16).min(255) as u8;
                self.current = Some(Picture::solid(width, height, [shade, 128, 255 - shade]));
                Ok(())
            }
            SeekOutcome::Fail(reason) => Err(ExtractionError::SeekError { timestamp, reason }),
            SeekOutcome::Hang => std::future::pending().await,
            SeekOutcome::NoPicture => Ok(()),
        }
    }

    fn current_picture(&self) -> Option<&Picture> {
        self.current.as_ref()
    }
}

impl Drop for ScriptedContext {
    fn drop(&mut self) {
        self.state.released.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn scripted_source() -> VideoSource {
    VideoSource::from_path("scripted.mp4").with_mime_type("video/mp4")
}
