//! Audio/Video Synchronization
//!
//! Audio is the master clock. The output device drains a small ring of
//! buffers at its own rate and the driver refills each one as it comes back.
//! Video is pulled: the displayed frame advances only once it trails the
//! audio clock by more than a slack, so video never runs ahead of audio.
//! Without audio, or once audio has played out, the host's tick deltas
//! provide a wall clock instead.

use std::collections::VecDeque;
use std::path::Path;

use serde::Serialize;

use crate::audio::AudioFrame;
use crate::config::ReelConfig;
use crate::output::{AudioOutput, VideoSink};
use crate::session::PlaybackSession;
use crate::source::ByteSource;

/// Decode attempts spent on one audio buffer before giving up for the tick.
const AUDIO_DECODE_RETRIES: usize = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SyncStats {
    pub ticks: u64,
    pub video_frames_presented: u64,
    /// Decoded while catching up but never shown.
    pub video_frames_dropped: u64,
    pub video_decode_misses: u64,
    pub present_errors: u64,
    pub audio_buffers_queued: u64,
    pub audio_buffers_played: u64,
    /// Times the output starved and had to be restarted.
    pub audio_restarts: u64,
    pub seeks: u64,
    pub seek_retries: u64,
    pub seek_backoffs: u64,
    /// Largest amount the displayed frame was ahead of the audio clock.
    pub max_video_lead_secs: f64,
    /// Displayed frame minus audio clock at the last tick.
    pub last_drift_secs: f64,
}

pub struct SyncDriver<A: AudioOutput, V: VideoSink> {
    session: PlaybackSession,
    audio_out: A,
    video_sink: V,
    config: ReelConfig,

    elapsed_ms: u64,
    /// Host time at which media time zero would have played.
    clock_origin_ms: Option<f64>,
    /// End of the last buffer the device finished playing.
    last_audio_ts: Option<f64>,
    /// Timestamp of the frame on screen.
    video_ts: Option<f64>,

    /// (start, end) media time of every buffer handed to the device.
    queued: VecDeque<(f64, f64)>,
    audio_started: bool,
    audio_completed: bool,
    finish_logged: bool,
    next_status_ms: u64,
    stats: SyncStats,
}

impl<A: AudioOutput, V: VideoSink> std::fmt::Debug for SyncDriver<A, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncDriver")
            .field("session", &self.session)
            .field("audio_out", &self.audio_out.name())
            .field("elapsed_ms", &self.elapsed_ms)
            .field("last_audio_ts", &self.last_audio_ts)
            .field("video_ts", &self.video_ts)
            .field("audio_started", &self.audio_started)
            .field("audio_completed", &self.audio_completed)
            .finish()
    }
}

impl<A: AudioOutput, V: VideoSink> SyncDriver<A, V> {
    pub fn new(session: PlaybackSession, audio_out: A, video_sink: V) -> Self {
        let config = session.config().clone();
        let next_status_ms = config.status_interval_ms;
        Self {
            session,
            audio_out,
            video_sink,
            config,
            elapsed_ms: 0,
            clock_origin_ms: None,
            last_audio_ts: None,
            video_ts: None,
            queued: VecDeque::new(),
            audio_started: false,
            audio_completed: false,
            finish_logged: false,
            next_status_ms,
            stats: SyncStats::default(),
        }
    }

    fn reset_sync(&mut self) {
        self.elapsed_ms = 0;
        self.clock_origin_ms = None;
        self.last_audio_ts = None;
        self.video_ts = None;
        self.queued.clear();
        self.audio_started = false;
        self.audio_completed = false;
        self.finish_logged = false;
        self.next_status_ms = self.config.status_interval_ms;
    }

    // ------------------------------------------------------------------------
    // Host control
    // ------------------------------------------------------------------------

    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> bool {
        self.audio_out.stop();
        self.reset_sync();
        self.session.load(path)
    }

    pub fn load_source<S: ByteSource + 'static>(&mut self, source: S) -> bool {
        self.audio_out.stop();
        self.reset_sync();
        self.session.load_source(source)
    }

    pub fn play(&mut self) -> bool {
        if !self.session.play() {
            return false;
        }
        if self.audio_started && !self.audio_completed {
            if let Err(e) = self.audio_out.play() {
                tracing::warn!("audio output did not resume: {}", e);
            }
        }
        true
    }

    pub fn pause(&mut self) -> bool {
        if !self.session.pause() {
            return false;
        }
        self.audio_out.pause();
        true
    }

    pub fn stop(&mut self) {
        self.audio_out.stop();
        self.session.stop();
        self.reset_sync();
    }

    /// Rewind to the start and show the first frame straight away.
    pub fn replay(&mut self) -> bool {
        self.audio_out.stop();
        self.reset_sync();
        if !self.session.replay() {
            return false;
        }
        if self.session.has_new_video_frame() {
            self.present_video();
        }
        true
    }

    /// Seek and show the first decodable frame at or after `t`.
    ///
    /// Decoding right after a seek can fail until a keyframe arrives. After
    /// enough consecutive failures the target backs off and the seek repeats.
    pub fn seek(&mut self, t: f64) -> bool {
        if !self.session.seek(t) {
            return false;
        }
        self.audio_out.stop();
        self.reset_sync();
        self.stats.seeks += 1;

        let mut target = t.clamp(0.0, self.session.duration().max(0.0));
        self.elapsed_ms = secs_to_ms(target);
        if !self.session.has_video_track() {
            return true;
        }

        let mut failures = 0;
        let mut found = false;
        for attempt in 1..=self.config.seek_max_attempts {
            if self.session.decode_next_video_frame() {
                self.present_video();
                found = true;
                break;
            }
            if self.session.is_video_track_finished() {
                break;
            }
            failures += 1;
            self.stats.seek_retries += 1;
            tracing::debug!("seek attempt {} at {:.3}s produced no frame", attempt, target);

            if failures >= self.config.seek_failures_before_backoff {
                let back = (target - self.config.seek_backoff_secs).max(0.0);
                tracing::info!("No frame after seek to {:.3}s, retrying from {:.3}s", target, back);
                if !self.session.seek(back) {
                    break;
                }
                target = back;
                self.elapsed_ms = secs_to_ms(target);
                self.stats.seek_backoffs += 1;
                failures = 0;
            }
        }
        if !found {
            tracing::warn!("Seek to {:.3}s found no decodable frame", t);
        }
        true
    }

    // ------------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------------

    /// Advance playback by `delta_ms` of host time. A zero delta does nothing.
    pub fn update(&mut self, delta_ms: u64) {
        if delta_ms == 0 || !self.session.is_playing() || self.is_finished() {
            return;
        }
        let now = self.elapsed_ms + delta_ms;
        self.stats.ticks += 1;
        self.audio_out.advance(delta_ms);

        self.ensure_video_frame();
        if !self.audio_started && !self.audio_completed {
            self.start_audio(now);
        }

        if self.clock_origin_ms.is_none() {
            let first = self.video_ts.or_else(|| self.queued.front().map(|&(start, _)| start));
            if let Some(first) = first {
                self.clock_origin_ms = Some(now as f64 - first * 1000.0);
                tracing::debug!("clock origin set at {}ms for frame {:.3}s", now, first);
            }
        }

        if self.clock_origin_ms.is_some() {
            if self.audio_started && !self.audio_completed {
                self.drive_audio(now);
            }
            self.drive_video(now);
            self.track_drift();
        }

        if self.is_finished() && !self.finish_logged {
            self.finish_logged = true;
            tracing::info!(
                "Playback finished at {:.2}s ({} frames shown, {} dropped)",
                now as f64 * 0.001,
                self.stats.video_frames_presented,
                self.stats.video_frames_dropped
            );
        }
        if now >= self.next_status_ms {
            self.log_status(now);
            while self.next_status_ms <= now {
                self.next_status_ms += self.config.status_interval_ms.max(1);
            }
        }
        self.elapsed_ms = now;
    }

    fn ensure_video_frame(&mut self) {
        if self.video_ts.is_some()
            || !self.session.has_video_track()
            || self.session.is_video_track_finished()
        {
            return;
        }
        if self.session.decode_next_video_frame() {
            self.present_video();
        } else if !self.session.is_video_track_finished() {
            self.stats.video_decode_misses += 1;
        }
    }

    /// Show the session's fresh frame and adopt its timestamp.
    fn present_video(&mut self) {
        let Some(frame) = self.session.get_current_video_frame() else {
            return;
        };
        self.video_ts = Some(frame.timestamp);
        match self.video_sink.present(&frame) {
            Ok(()) => self.stats.video_frames_presented += 1,
            Err(e) => {
                tracing::warn!("frame at {:.3}s not presented: {}", frame.timestamp, e);
                self.stats.present_errors += 1;
            }
        }
    }

    fn video_behind(&self, now: u64) -> bool {
        let Some(ts) = self.video_ts else {
            return false;
        };
        match self.audio_clock() {
            Some(audio) => ts < audio - self.config.av_slack_secs,
            None => match self.clock_origin_ms {
                Some(origin) => {
                    let expected = (now as f64 - origin) / 1000.0;
                    ts - expected < -self.config.wallclock_slack_secs
                }
                None => false,
            },
        }
    }

    fn audio_clock(&self) -> Option<f64> {
        if self.audio_started && !self.audio_completed {
            self.last_audio_ts
        } else {
            None
        }
    }

    fn drive_video(&mut self, now: u64) {
        if self.video_ts.is_none() || self.session.is_video_track_finished() {
            return;
        }
        let max = self.config.max_frames_per_tick.max(1);
        let mut decoded = 0;
        while decoded < max && self.video_behind(now) {
            if !self.session.decode_next_video_frame() {
                if !self.session.is_video_track_finished() {
                    self.stats.video_decode_misses += 1;
                }
                break;
            }
            decoded += 1;
            self.video_ts = self.session.current_video_info().map(|info| info.timestamp);

            if decoded < max && self.video_behind(now) {
                self.session.get_current_video_frame();
                self.stats.video_frames_dropped += 1;
                continue;
            }
            self.present_video();
        }
    }

    // ------------------------------------------------------------------------
    // Audio
    // ------------------------------------------------------------------------

    fn pull_audio_frame(&mut self) -> Option<AudioFrame> {
        for _ in 0..AUDIO_DECODE_RETRIES {
            if self.session.decode_next_audio_frame() {
                return self.session.get_current_audio_frame().cloned();
            }
            if self.session.is_audio_track_finished() {
                break;
            }
        }
        None
    }

    fn queue_next_audio(&mut self) -> bool {
        let Some(frame) = self.pull_audio_frame() else {
            return false;
        };
        if let Err(e) = self.audio_out.queue(&frame) {
            tracing::warn!("audio buffer at {:.3}s rejected: {}", frame.timestamp, e);
            return false;
        }
        self.queued
            .push_back((frame.timestamp, frame.timestamp + frame.duration_secs()));
        self.stats.audio_buffers_queued += 1;
        true
    }

    fn start_audio(&mut self, now: u64) {
        if !self.session.has_audio_track() {
            self.audio_completed = true;
            return;
        }
        for _ in 0..self.config.audio_ring_buffers {
            if !self.queue_next_audio() {
                break;
            }
        }
        let Some(&(first, _)) = self.queued.front() else {
            tracing::warn!("No audio could be decoded, continuing without audio");
            self.complete_audio(now);
            return;
        };
        if let Err(e) = self.audio_out.play() {
            tracing::warn!("{} output failed to start ({}), continuing without audio", self.audio_out.name(), e);
            self.audio_out.stop();
            self.queued.clear();
            self.complete_audio(now);
            return;
        }
        self.audio_started = true;
        self.last_audio_ts = Some(first);
        tracing::debug!(
            "audio started with {} buffers on {}",
            self.queued.len(),
            self.audio_out.name()
        );
    }

    fn drive_audio(&mut self, now: u64) {
        let processed = self.audio_out.processed();
        for _ in 0..processed {
            if !self.audio_out.unqueue() {
                break;
            }
            if let Some((_, end)) = self.queued.pop_front() {
                self.last_audio_ts = Some(end);
            }
            self.stats.audio_buffers_played += 1;
            // Past the end of the track this fails; keep unqueueing regardless.
            self.queue_next_audio();
        }

        if self.audio_out.is_starved() {
            if self.queued.is_empty() {
                self.complete_audio(now);
            } else {
                self.stats.audio_restarts += 1;
                tracing::debug!("audio output starved, restarting");
                if let Err(e) = self.audio_out.play() {
                    tracing::warn!("audio output did not restart: {}", e);
                    self.audio_out.stop();
                    self.queued.clear();
                    self.complete_audio(now);
                }
            }
        }
    }

    /// Hand the clock back to the host so video keeps going from where audio left off.
    fn complete_audio(&mut self, now: u64) {
        if self.audio_completed {
            return;
        }
        self.audio_completed = true;
        if let Some(last) = self.last_audio_ts {
            self.clock_origin_ms = Some(now as f64 - last * 1000.0);
        }
        tracing::info!("Audio complete");
    }

    fn track_drift(&mut self) {
        if let (Some(video), Some(audio)) = (self.video_ts, self.audio_clock()) {
            let drift = video - audio;
            self.stats.last_drift_secs = drift;
            if drift > self.stats.max_video_lead_secs {
                self.stats.max_video_lead_secs = drift;
            }
        }
    }

    fn log_status(&self, now: u64) {
        tracing::info!(
            "t={:.2}s video={} audio={} drift={:+.1}ms shown={} dropped={}",
            now as f64 * 0.001,
            fmt_ts(self.video_ts),
            fmt_ts(self.audio_clock()),
            self.stats.last_drift_secs * 1000.0,
            self.stats.video_frames_presented,
            self.stats.video_frames_dropped
        );
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn is_playing(&self) -> bool {
        self.session.is_playing()
    }

    /// Video played out and audio either absent or played out.
    pub fn is_finished(&self) -> bool {
        if !self.session.is_loaded() {
            return false;
        }
        let video_done = !self.session.has_video_track() || self.session.is_video_track_finished();
        let audio_done = !self.session.has_audio_track() || self.audio_completed;
        video_done && audio_done
    }

    pub fn is_active(&self) -> bool {
        self.is_playing() && !self.is_finished()
    }

    /// Host playback position in seconds.
    pub fn current_time(&self) -> f64 {
        self.elapsed_ms as f64 * 0.001
    }

    pub fn duration(&self) -> f64 {
        self.session.duration()
    }

    pub fn video_timestamp(&self) -> Option<f64> {
        self.video_ts
    }

    pub fn audio_timestamp(&self) -> Option<f64> {
        self.last_audio_ts
    }

    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn audio_output(&self) -> &A {
        &self.audio_out
    }

    pub fn video_sink(&self) -> &V {
        &self.video_sink
    }
}

fn secs_to_ms(secs: f64) -> u64 {
    (secs.max(0.0) * 1000.0).round() as u64
}

fn fmt_ts(ts: Option<f64>) -> String {
    ts.map_or_else(|| "-".to_string(), |t| format!("{:.3}", t))
}
