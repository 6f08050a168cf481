//! Playback tunables.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::audio::AudioDecoderOptions;
use crate::decode::VideoEngineOptions;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReelConfig {
    /// Buffers kept by the video adapter's pool.
    pub pool_depth: usize,
    /// Copy frames into contiguous planes instead of exposing engine strides.
    pub require_compact_frames: bool,
    pub error_concealment: bool,

    pub audio_max_channels: u16,
    pub audio_limiter: bool,
    pub audio_drc: bool,
    /// Hardware buffers kept in flight by the driver.
    pub audio_ring_buffers: usize,

    /// Video advances once it trails audio by more than this.
    pub av_slack_secs: f64,
    /// Same, against the wall clock when there is no audio.
    pub wallclock_slack_secs: f64,
    /// Frames the driver may advance in one tick while catching up.
    pub max_frames_per_tick: u32,

    pub seek_max_attempts: u32,
    pub seek_failures_before_backoff: u32,
    pub seek_backoff_secs: f64,

    pub status_interval_ms: u64,
    /// Tick rate assumed for video tracks with no timescale.
    pub default_video_timescale: u32,
}

impl Default for ReelConfig {
    fn default() -> Self {
        Self {
            pool_depth: 3,
            require_compact_frames: false,
            error_concealment: true,
            audio_max_channels: 8,
            audio_limiter: false,
            audio_drc: false,
            audio_ring_buffers: 8,
            av_slack_secs: 0.040,
            wallclock_slack_secs: 0.050,
            max_frames_per_tick: 1,
            seek_max_attempts: 10,
            seek_failures_before_backoff: 3,
            seek_backoff_secs: 1.0,
            status_interval_ms: 2000,
            default_video_timescale: 90_000,
        }
    }
}

impl ReelConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::InvalidParam(format!("config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|e| Error::from_open(&display, e))?;
        Self::from_json_str(&content)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::InvalidParam(format!("config: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.pool_depth == 0 {
            return Err(Error::InvalidParam("pool_depth must be at least 1".into()));
        }
        if self.audio_ring_buffers == 0 {
            return Err(Error::InvalidParam("audio_ring_buffers must be at least 1".into()));
        }
        if self.max_frames_per_tick == 0 {
            return Err(Error::InvalidParam("max_frames_per_tick must be at least 1".into()));
        }
        if self.audio_max_channels == 0 {
            return Err(Error::InvalidParam("audio_max_channels must be at least 1".into()));
        }
        for (name, value) in [
            ("av_slack_secs", self.av_slack_secs),
            ("wallclock_slack_secs", self.wallclock_slack_secs),
            ("seek_backoff_secs", self.seek_backoff_secs),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidParam(format!("{} = {}", name, value)));
            }
        }
        Ok(())
    }

    pub fn video_options(&self) -> VideoEngineOptions {
        VideoEngineOptions {
            error_concealment: self.error_concealment,
        }
    }

    pub fn audio_options(&self) -> AudioDecoderOptions {
        AudioDecoderOptions {
            max_channels: self.audio_max_channels,
            limiter: self.audio_limiter,
            drc: self.audio_drc,
        }
    }
}
