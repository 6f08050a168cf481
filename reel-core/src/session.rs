//! # Playback Session
//!
//! Drives a [`DecoderOrchestrator`] one sample at a time on demand.
//!
//! ```text
//! Unloaded --load()--> Loaded --play()--> Playing <--pause()/play()--> Paused
//!    ^                   |                   |                           |
//!    +------stop()-------+-------------------+---------------------------+
//!
//! replay(): any loaded state -> Playing, decoders reset, cursors at zero
//! ```
//!
//! Each track keeps a freshness flag. `decode_next_*` is a no-op while a
//! fresh frame is waiting; `get_current_*` clears the flag, so every decoded
//! frame is delivered at most once. End of track is reported only by the
//! demuxer, never inferred from decode failures.

use std::path::Path;

use serde::Serialize;

use crate::aac::AudioSpecificConfig;
use crate::audio::AudioFrame;
use crate::config::ReelConfig;
use crate::decode::{FrameLayout, VideoFrame};
use crate::error::{Error, ErrorKind, ErrorSlot, Result};
use crate::h264_utils::{avcc_to_annexb_into, first_nal_kind, DEFAULT_NAL_LENGTH_SIZE};
use crate::mp4_demux::{CodecConfig, Mp4Demuxer, Track};
use crate::pipeline::DecoderOrchestrator;
use crate::source::ByteSource;

/// Sample rate assumed for audio tracks that report neither timescale nor rate.
const FALLBACK_AUDIO_RATE: u32 = 44_100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Unloaded,
    Loaded,
    Playing,
    Paused,
}

/// Metadata of the buffered video frame. Planes stay in the video adapter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VideoFrameInfo {
    pub layout: FrameLayout,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub video_samples: u64,
    pub audio_samples: u64,
    pub video_frames: u64,
    pub audio_frames: u64,
    /// Samples consumed without producing a frame.
    pub video_misses: u64,
    pub audio_misses: u64,
    pub handshakes: u64,
    pub seeks: u64,
    pub replays: u64,
}

/// Convert container ticks to seconds, substituting `fallback` for a zero timescale.
pub fn ticks_to_secs(ticks: u64, timescale: u32, fallback: u32) -> f64 {
    let scale = if timescale > 0 { timescale } else { fallback.max(1) };
    ticks as f64 / scale as f64
}

pub struct PlaybackSession {
    orchestrator: DecoderOrchestrator,
    config: ReelConfig,
    state: SessionState,
    duration: f64,
    video_track: Option<Track>,
    audio_track: Option<Track>,
    nal_length_size: usize,

    current_video: Option<VideoFrameInfo>,
    current_audio: Option<AudioFrame>,
    has_new_video: bool,
    has_new_audio: bool,
    video_finished: bool,
    audio_finished: bool,
    video_config_sent: bool,
    audio_config_sent: bool,

    /// Reassembly scratch, reused across samples.
    annexb: Vec<u8>,
    stats: SessionStats,
    error: ErrorSlot,
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("state", &self.state)
            .field("duration", &self.duration)
            .field("has_new_video", &self.has_new_video)
            .field("has_new_audio", &self.has_new_audio)
            .field("video_finished", &self.video_finished)
            .field("audio_finished", &self.audio_finished)
            .finish()
    }
}

impl PlaybackSession {
    pub fn new(orchestrator: DecoderOrchestrator, config: ReelConfig) -> Self {
        Self {
            orchestrator,
            config,
            state: SessionState::Unloaded,
            duration: 0.0,
            video_track: None,
            audio_track: None,
            nal_length_size: DEFAULT_NAL_LENGTH_SIZE,
            current_video: None,
            current_audio: None,
            has_new_video: false,
            has_new_audio: false,
            video_finished: false,
            audio_finished: false,
            video_config_sent: false,
            audio_config_sent: false,
            annexb: Vec::new(),
            stats: SessionStats::default(),
            error: ErrorSlot::new(),
        }
    }

    /// Session backed by the software engines.
    #[cfg(feature = "software-decode")]
    pub fn software(config: ReelConfig) -> Self {
        Self::new(DecoderOrchestrator::software(&config), config)
    }

    // ------------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------------

    /// Open a container. On failure the session is left unloaded and usable.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> bool {
        let path = path.as_ref();
        self.unload_if_needed();
        let result = self.orchestrator.open_file(path).and_then(|_| self.attach_file());
        self.finish_load(result, &path.display().to_string())
    }

    pub fn load_source<S: ByteSource + 'static>(&mut self, source: S) -> bool {
        self.unload_if_needed();
        let result = self.orchestrator.open_source(source).and_then(|_| self.attach_file());
        self.finish_load(result, "<source>")
    }

    fn unload_if_needed(&mut self) {
        if self.state != SessionState::Unloaded {
            self.stop();
        }
    }

    fn finish_load(&mut self, result: Result<()>, name: &str) -> bool {
        match result {
            Ok(()) => {
                tracing::info!(
                    "Loaded {}: {:.3}s, video={}, audio={}",
                    name,
                    self.duration,
                    self.video_track.is_some(),
                    self.audio_track.is_some()
                );
                self.error.clear();
                true
            }
            Err(e) => {
                tracing::warn!("Failed to load {}: {}", name, e);
                self.orchestrator.close_file();
                self.reset_playback();
                self.state = SessionState::Unloaded;
                self.error.set(e);
                false
            }
        }
    }

    fn attach_file(&mut self) -> Result<()> {
        let demuxer = self.demuxer()?;
        let video = demuxer.video_track().cloned();
        let audio = demuxer.audio_track().cloned();
        let duration = demuxer.duration();
        if video.is_none() && audio.is_none() {
            return Err(Error::UnsupportedFormat(
                "no H.264 video or AAC audio track".into(),
            ));
        }

        self.video_track = video;
        self.audio_track = audio;
        self.duration = duration;
        self.reset_playback();
        self.state = SessionState::Loaded;

        // Prime the decoder now so the first decode does not pay for it.
        if self.video_track.is_some() {
            if let Err(e) = self.send_video_config() {
                tracing::warn!("video pre-configuration failed: {}", e);
            }
        }
        Ok(())
    }

    fn reset_playback(&mut self) {
        self.current_video = None;
        self.current_audio = None;
        self.has_new_video = false;
        self.has_new_audio = false;
        self.video_finished = false;
        self.audio_finished = false;
        self.video_config_sent = false;
        self.audio_config_sent = false;
        self.nal_length_size = DEFAULT_NAL_LENGTH_SIZE;
    }

    fn demuxer(&self) -> Result<&Mp4Demuxer> {
        self.orchestrator
            .demuxer()
            .ok_or_else(|| Error::DecoderInitFailed("no container open".into()))
    }

    fn demuxer_mut(&mut self) -> Result<&mut Mp4Demuxer> {
        self.orchestrator
            .demuxer_mut()
            .ok_or_else(|| Error::DecoderInitFailed("no container open".into()))
    }

    fn require_loaded(&self) -> Result<()> {
        if self.state == SessionState::Unloaded {
            return Err(Error::DecoderInitFailed("movie not loaded".into()));
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------------

    pub fn play(&mut self) -> bool {
        self.transition(SessionState::Playing)
    }

    pub fn pause(&mut self) -> bool {
        self.transition(SessionState::Paused)
    }

    fn transition(&mut self, to: SessionState) -> bool {
        if let Err(e) = self.require_loaded() {
            self.error.set(e);
            return false;
        }
        if self.state != to {
            tracing::debug!("session {:?} -> {:?}", self.state, to);
        }
        self.state = to;
        self.error.clear();
        true
    }

    /// Close the container and return to `Unloaded`.
    pub fn stop(&mut self) {
        if self.state != SessionState::Unloaded {
            tracing::info!("Stopping playback");
        }
        self.orchestrator.close_file();
        self.reset_playback();
        self.video_track = None;
        self.audio_track = None;
        self.duration = 0.0;
        self.state = SessionState::Unloaded;
        self.error.clear();
    }

    /// Move every track to the first sample at or after `t` seconds.
    pub fn seek(&mut self, t: f64) -> bool {
        let result = self.seek_inner(t);
        match result {
            Ok(()) => {
                self.error.clear();
                true
            }
            Err(e) => {
                tracing::warn!("Seek to {:.3}s failed: {}", t, e);
                self.error.set(e);
                false
            }
        }
    }

    fn seek_inner(&mut self, t: f64) -> Result<()> {
        self.require_loaded()?;
        self.demuxer_mut()?.seek_to_time(t)?;

        self.has_new_video = false;
        self.has_new_audio = false;
        self.current_video = None;
        self.current_audio = None;
        self.video_finished = false;
        self.audio_finished = false;
        // Reference pictures from before the seek point are useless now.
        // Audio keeps its configuration.
        self.video_config_sent = false;
        self.orchestrator.video_mut().reset()?;
        self.orchestrator.audio_mut().reset();
        self.stats.seeks += 1;
        tracing::info!("Seek to {:.3}s", t);
        Ok(())
    }

    /// Restart from the beginning without reopening the container.
    pub fn replay(&mut self) -> bool {
        match self.replay_inner() {
            Ok(()) => {
                self.error.clear();
                true
            }
            Err(e) => {
                tracing::warn!("Replay failed: {}", e);
                self.error.set(e);
                false
            }
        }
    }

    fn replay_inner(&mut self) -> Result<()> {
        self.require_loaded()?;
        tracing::info!("Replaying from the start");

        self.current_video = None;
        self.current_audio = None;
        self.has_new_video = false;
        self.has_new_audio = false;
        self.video_finished = false;
        self.audio_finished = false;
        self.video_config_sent = false;
        self.audio_config_sent = false;

        self.orchestrator.video_mut().reset()?;
        self.orchestrator.audio_mut().reset();
        self.demuxer_mut()?.seek_to_time(0.0)?;

        self.state = SessionState::Playing;
        self.stats.replays += 1;

        let attempts = self.prebuffer(3);
        if !self.has_new_video && self.video_track.is_some() {
            tracing::warn!("no video frame after {} decode attempts", attempts);
        }
        Ok(())
    }

    /// Decode until a video frame is waiting or `max_attempts` runs out.
    /// Returns the number of attempts made.
    pub fn prebuffer(&mut self, max_attempts: u32) -> u32 {
        let mut attempts = 0;
        while attempts < max_attempts && !self.has_new_video {
            attempts += 1;
            let decoded = self.decode_next_frame();
            tracing::debug!("prebuffer attempt {}: {}", attempts, decoded);
            if self.video_track.is_none() {
                break;
            }
        }
        attempts
    }

    // ------------------------------------------------------------------------
    // Decoding
    // ------------------------------------------------------------------------

    /// Decode whichever tracks have no fresh frame. True if either produced one.
    pub fn decode_next_frame(&mut self) -> bool {
        let mut video = false;
        let mut audio = false;
        if !self.has_new_video {
            video = self.decode_next_video_frame();
        }
        if !self.has_new_audio {
            audio = self.decode_next_audio_frame();
        }
        video || audio
    }

    pub fn decode_next_video_frame(&mut self) -> bool {
        match self.decode_video() {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::debug!("video decode: {}", e);
                self.error.set(e);
                false
            }
        }
    }

    pub fn decode_next_audio_frame(&mut self) -> bool {
        match self.decode_audio() {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::debug!("audio decode: {}", e);
                self.error.set(e);
                false
            }
        }
    }

    /// Send SPS and PPS, each as its own start-code unit.
    fn send_video_config(&mut self) -> Result<()> {
        let Some(track_id) = self.video_track.as_ref().map(|t| t.track_id) else {
            return Ok(());
        };
        let config = self.demuxer()?.extract_config_record(track_id);
        let Some(CodecConfig::Avc(avc)) = config else {
            tracing::debug!("track {} has no avcC record", track_id);
            return Ok(());
        };
        self.nal_length_size = avc.nal_length_size;
        if !avc.is_complete() {
            tracing::debug!(
                "track {} avcC carries {} SPS / {} PPS, not sending",
                track_id,
                avc.sps.len(),
                avc.pps.len()
            );
            return Ok(());
        }

        let video = self.orchestrator.video_mut();
        for unit in avc.annexb_units() {
            if let Err(e) = video.decode(&unit) {
                tracing::warn!("parameter set rejected: {}", e);
            }
        }
        tracing::debug!(
            "sent {} SPS and {} PPS (length size {})",
            avc.sps.len(),
            avc.pps.len(),
            avc.nal_length_size
        );
        self.video_config_sent = true;
        self.stats.handshakes += 1;
        Ok(())
    }

    fn decode_video(&mut self) -> Result<bool> {
        self.require_loaded()?;
        let Some((track_id, timescale)) = self.video_track.as_ref().map(|t| (t.track_id, t.timescale))
        else {
            return Ok(false);
        };
        if self.has_new_video {
            return Ok(true);
        }
        if !self.video_config_sent {
            self.send_video_config()?;
        }

        let Some(sample) = self.demuxer_mut()?.read_next_sample(track_id)? else {
            if !self.video_finished {
                tracing::info!("Video track finished");
            }
            self.video_finished = true;
            return Ok(false);
        };
        self.stats.video_samples += 1;

        self.annexb.clear();
        avcc_to_annexb_into(&sample.data, self.nal_length_size, &mut self.annexb);
        if self.annexb.is_empty() {
            self.stats.video_misses += 1;
            return Err(Error::DecodeFailed(format!(
                "video sample at {} holds no NAL units",
                sample.timestamp
            )));
        }
        tracing::trace!(
            "video sample {} ({} bytes, {:?})",
            sample.timestamp,
            sample.data.len(),
            first_nal_kind(&self.annexb)
        );

        let Some(layout) = self.orchestrator.video_mut().decode(&self.annexb)? else {
            self.stats.video_misses += 1;
            // A flush can move the stored frame into a pool buffer.
            if let (Some(info), Some(layout)) = (
                self.current_video.as_mut(),
                self.orchestrator.video().output_layout(),
            ) {
                info.layout = layout;
            }
            return Ok(false);
        };

        let timestamp = ticks_to_secs(
            sample.timestamp,
            timescale,
            self.config.default_video_timescale,
        );
        self.current_video = Some(VideoFrameInfo { layout, timestamp });
        self.has_new_video = true;
        self.stats.video_frames += 1;
        self.error.clear();
        Ok(true)
    }

    fn decode_audio(&mut self) -> Result<bool> {
        self.require_loaded()?;
        let Some(track) = self.audio_track.as_ref() else {
            return Ok(false);
        };
        let (track_id, timescale) = (track.track_id, track.timescale);
        let (rate, channels) = (track.sample_rate(), track.channels());
        if self.has_new_audio {
            return Ok(true);
        }

        if !self.audio_config_sent {
            let asc = AudioSpecificConfig::synthesize(rate, channels).to_bytes();
            self.orchestrator.audio_mut().configure_with_config_record(&asc)?;
            tracing::debug!("audio configured: {} Hz, {} ch, ASC {:02x?}", rate, channels, asc);
            self.audio_config_sent = true;
        }

        let Some(sample) = self.demuxer_mut()?.read_next_sample(track_id)? else {
            if !self.audio_finished {
                tracing::info!("Audio track finished");
            }
            self.audio_finished = true;
            return Ok(false);
        };
        self.stats.audio_samples += 1;

        let Some(mut frame) = self.orchestrator.audio_mut().decode(&sample.data)? else {
            self.stats.audio_misses += 1;
            return Ok(false);
        };

        let fallback = if rate > 0 { rate } else { FALLBACK_AUDIO_RATE };
        frame.timestamp = ticks_to_secs(sample.timestamp, timescale, fallback);
        self.current_audio = Some(frame);
        self.has_new_audio = true;
        self.stats.audio_frames += 1;
        self.error.clear();
        Ok(true)
    }

    // ------------------------------------------------------------------------
    // Frame pull
    // ------------------------------------------------------------------------

    pub fn has_new_video_frame(&self) -> bool {
        self.has_new_video
    }

    pub fn has_new_audio_frame(&self) -> bool {
        self.has_new_audio
    }

    /// Last decoded video frame; clears the freshness flag.
    ///
    /// The frame borrows the session, so it is gone before the next decode.
    pub fn get_current_video_frame(&mut self) -> Option<VideoFrame<'_>> {
        self.has_new_video = false;
        let info = self.current_video?;
        self.orchestrator
            .video()
            .frame()
            .map(|frame| frame.with_timestamp(info.timestamp))
    }

    /// Last decoded audio frame; clears the freshness flag.
    pub fn get_current_audio_frame(&mut self) -> Option<&AudioFrame> {
        self.has_new_audio = false;
        self.current_audio.as_ref()
    }

    /// Buffered video metadata, without touching the freshness flag.
    pub fn current_video_info(&self) -> Option<VideoFrameInfo> {
        self.current_video
    }

    pub fn current_audio_timestamp(&self) -> Option<f64> {
        self.current_audio.as_ref().map(|f| f.timestamp)
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.state != SessionState::Unloaded
    }

    pub fn is_playing(&self) -> bool {
        self.state == SessionState::Playing
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Timestamp of the last video sample read by the demuxer.
    pub fn current_time(&self) -> f64 {
        self.orchestrator
            .demuxer()
            .map(Mp4Demuxer::current_time)
            .unwrap_or(0.0)
    }

    pub fn has_video_track(&self) -> bool {
        self.video_track.is_some()
    }

    pub fn has_audio_track(&self) -> bool {
        self.audio_track.is_some()
    }

    pub fn video_track(&self) -> Option<&Track> {
        self.video_track.as_ref()
    }

    pub fn audio_track(&self) -> Option<&Track> {
        self.audio_track.as_ref()
    }

    pub fn is_video_track_finished(&self) -> bool {
        self.video_finished
    }

    pub fn is_audio_track_finished(&self) -> bool {
        self.audio_finished
    }

    /// Video decides completion; audio must also be drained when present.
    /// A file without video finishes with its audio.
    pub fn is_playback_finished(&self) -> bool {
        if !self.is_loaded() {
            return false;
        }
        let video_done = self.video_track.is_none() || self.video_finished;
        let audio_done = self.audio_track.is_none() || self.audio_finished;
        video_done && audio_done
    }

    pub fn orchestrator(&self) -> &DecoderOrchestrator {
        &self.orchestrator
    }

    pub fn config(&self) -> &ReelConfig {
        &self.config
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn last_error(&self) -> Option<ErrorKind> {
        self.error.last_error()
    }

    pub fn last_message(&self) -> &str {
        self.error.last_message()
    }
}
