//! # Decoder Orchestrator
//!
//! Owns one demuxer and one adapter of each codec type and moves them
//! through their lifecycle together:
//!
//! ```text
//! Created --initialize()--> Initialized --open_file()--> FileOpen
//!                               ^                           |
//!                               +-------close_file()--------+
//! any --destroy()--> Destroyed
//! ```

use std::path::Path;

use serde::Serialize;

use crate::audio::{AudioDecoder, AudioEngineFactory};
use crate::config::ReelConfig;
use crate::decode::{VideoDecoder, VideoEngineFactory};
use crate::error::{Error, ErrorKind, ErrorSlot, Result};
use crate::mp4_demux::{FileInfo, Mp4Demuxer};
use crate::source::ByteSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OrchestratorState {
    Created,
    Initialized,
    FileOpen,
    Destroyed,
}

pub struct DecoderOrchestrator {
    state: OrchestratorState,
    demuxer: Option<Mp4Demuxer>,
    video: VideoDecoder,
    audio: AudioDecoder,
    error: ErrorSlot,
}

impl std::fmt::Debug for DecoderOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderOrchestrator")
            .field("state", &self.state)
            .field("demuxer", &self.demuxer)
            .field("video", &self.video)
            .field("audio", &self.audio)
            .finish()
    }
}

impl DecoderOrchestrator {
    pub fn new(video: VideoDecoder, audio: AudioDecoder) -> Self {
        Self {
            state: OrchestratorState::Created,
            demuxer: None,
            video,
            audio,
            error: ErrorSlot::new(),
        }
    }

    /// Build both adapters from engine factories and the shared config.
    pub fn with_factories(
        video: VideoEngineFactory,
        audio: AudioEngineFactory,
        config: &ReelConfig,
    ) -> Self {
        let mut video = VideoDecoder::new(video, config.video_options(), config.pool_depth);
        video.set_require_compact(config.require_compact_frames);
        let audio = AudioDecoder::new(audio, config.audio_options());
        Self::new(video, audio)
    }

    /// OpenH264 for video, symphonia for audio.
    #[cfg(feature = "software-decode")]
    pub fn software(config: &ReelConfig) -> Self {
        Self::with_factories(
            crate::decode::openh264_factory(),
            crate::audio::symphonia_factory(),
            config,
        )
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        matches!(
            self.state,
            OrchestratorState::Initialized | OrchestratorState::FileOpen
        )
    }

    /// Create both decoding engines. Either failing leaves nothing running.
    pub fn initialize(&mut self) -> Result<()> {
        let result = self.initialize_inner();
        self.error.track(result)
    }

    fn initialize_inner(&mut self) -> Result<()> {
        if self.is_initialized() {
            return Ok(());
        }
        self.video.initialize()?;
        if let Err(e) = self.audio.initialize() {
            self.video.destroy();
            return Err(e);
        }
        self.state = OrchestratorState::Initialized;
        self.error.clear();
        tracing::debug!(
            "decoders ready: video={:?}",
            self.video.engine_name().unwrap_or("none")
        );
        Ok(())
    }

    /// Open a container, initializing the decoders first if needed.
    pub fn open_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let result = self.prepare_open().and_then(|_| Mp4Demuxer::open(path));
        let result = result.map(|demuxer| self.attach(demuxer));
        self.error.track(result)
    }

    pub fn open_source<S: ByteSource + 'static>(&mut self, source: S) -> Result<()> {
        let result = self.prepare_open().and_then(|_| Mp4Demuxer::from_source(source));
        let result = result.map(|demuxer| self.attach(demuxer));
        self.error.track(result)
    }

    fn prepare_open(&mut self) -> Result<()> {
        if self.state == OrchestratorState::Destroyed {
            return Err(Error::DecoderInitFailed("orchestrator destroyed".into()));
        }
        if self.demuxer.is_some() {
            self.close_file();
        }
        self.initialize_inner()
    }

    fn attach(&mut self, demuxer: Mp4Demuxer) {
        self.demuxer = Some(demuxer);
        self.state = OrchestratorState::FileOpen;
        self.error.clear();
    }

    /// Drop the demuxer and clear adapter state so the next file starts clean.
    pub fn close_file(&mut self) {
        if self.demuxer.take().is_some() {
            tracing::debug!("container closed");
            if self.video.is_initialized() {
                if let Err(e) = self.video.reset() {
                    tracing::warn!("video engine not recreated after close: {}", e);
                }
            }
        }
        self.audio.reset();
        if self.state == OrchestratorState::FileOpen {
            self.state = OrchestratorState::Initialized;
        }
    }

    pub fn destroy(&mut self) {
        self.demuxer = None;
        self.video.destroy();
        self.audio.destroy();
        self.state = OrchestratorState::Destroyed;
    }

    pub fn file_info(&self) -> Option<FileInfo> {
        self.demuxer.as_ref().map(Mp4Demuxer::file_info)
    }

    pub fn demuxer(&self) -> Option<&Mp4Demuxer> {
        self.demuxer.as_ref()
    }

    pub fn demuxer_mut(&mut self) -> Option<&mut Mp4Demuxer> {
        self.demuxer.as_mut()
    }

    pub fn video(&self) -> &VideoDecoder {
        &self.video
    }

    pub fn video_mut(&mut self) -> &mut VideoDecoder {
        &mut self.video
    }

    pub fn audio(&self) -> &AudioDecoder {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut AudioDecoder {
        &mut self.audio
    }

    pub fn last_error(&self) -> Option<ErrorKind> {
        self.error.last_error()
    }

    pub fn last_message(&self) -> &str {
        self.error.last_message()
    }
}

impl Drop for DecoderOrchestrator {
    fn drop(&mut self) {
        if self.state != OrchestratorState::Destroyed {
            self.destroy();
        }
    }
}
