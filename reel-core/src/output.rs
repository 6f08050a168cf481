//! Host-side outputs driven by the sync driver.
//!
//! [`AudioOutput`] models a small ring of hardware buffers that the device
//! drains at its own rate. [`VideoSink`] receives each presented frame while
//! its planes are still valid.

use std::collections::VecDeque;

use serde::Serialize;

use crate::audio::AudioFrame;
use crate::decode::VideoFrame;
use crate::error::{Error, Result};
use crate::pixel_convert::PixelConverter;

// ============================================================================
// Audio
// ============================================================================

pub trait AudioOutput {
    fn name(&self) -> &'static str;

    /// Append one buffer holding `frame` to the play queue.
    fn queue(&mut self, frame: &AudioFrame) -> Result<()>;

    /// Buffers the device has finished with and not yet unqueued.
    fn processed(&self) -> usize;

    /// Remove one processed buffer. `false` if none is processed.
    fn unqueue(&mut self) -> bool;

    fn play(&mut self) -> Result<()>;

    fn pause(&mut self);

    /// Stop and drop every queued buffer.
    fn stop(&mut self);

    /// The device stopped on its own because the queue ran dry.
    fn is_starved(&self) -> bool;

    /// Let `elapsed_ms` of host time pass. Real devices ignore this.
    fn advance(&mut self, _elapsed_ms: u64) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutputState {
    Initial,
    Playing,
    Paused,
    Stopped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AudioOutputStats {
    pub buffers_queued: u64,
    pub buffers_played: u64,
    pub samples_queued: u64,
    pub played_ms: f64,
    pub underruns: u64,
}

/// Audio device stand-in that consumes queued buffers in host time.
#[derive(Debug)]
pub struct SimulatedAudioOutput {
    /// Remaining milliseconds of each unplayed buffer, head first.
    pending: VecDeque<f64>,
    processed: usize,
    state: OutputState,
    stats: AudioOutputStats,
}

impl Default for SimulatedAudioOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedAudioOutput {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            processed: 0,
            state: OutputState::Initial,
            stats: AudioOutputStats::default(),
        }
    }

    pub fn state(&self) -> OutputState {
        self.state
    }

    pub fn queued(&self) -> usize {
        self.pending.len() + self.processed
    }

    pub fn stats(&self) -> AudioOutputStats {
        self.stats
    }
}

impl AudioOutput for SimulatedAudioOutput {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn queue(&mut self, frame: &AudioFrame) -> Result<()> {
        if !frame.is_valid() {
            return Err(Error::InvalidParam(format!(
                "audio buffer with {} samples at {} Hz x{}",
                frame.samples.len(),
                frame.sample_rate,
                frame.channels
            )));
        }
        self.pending.push_back(frame.duration_secs() * 1000.0);
        self.stats.buffers_queued += 1;
        self.stats.samples_queued += frame.samples.len() as u64;
        Ok(())
    }

    fn processed(&self) -> usize {
        self.processed
    }

    fn unqueue(&mut self) -> bool {
        if self.processed == 0 {
            return false;
        }
        self.processed -= 1;
        true
    }

    fn play(&mut self) -> Result<()> {
        self.state = if self.pending.is_empty() {
            OutputState::Stopped
        } else {
            OutputState::Playing
        };
        Ok(())
    }

    fn pause(&mut self) {
        if self.state == OutputState::Playing {
            self.state = OutputState::Paused;
        }
    }

    fn stop(&mut self) {
        self.pending.clear();
        self.processed = 0;
        self.state = OutputState::Stopped;
    }

    fn is_starved(&self) -> bool {
        self.state == OutputState::Stopped
    }

    fn advance(&mut self, elapsed_ms: u64) {
        if self.state != OutputState::Playing {
            return;
        }
        let mut budget = elapsed_ms as f64;
        while budget > 0.0 {
            let Some(head) = self.pending.front_mut() else {
                break;
            };
            if *head > budget {
                *head -= budget;
                self.stats.played_ms += budget;
                budget = 0.0;
            } else {
                budget -= *head;
                self.stats.played_ms += *head;
                self.pending.pop_front();
                self.processed += 1;
                self.stats.buffers_played += 1;
            }
        }
        if self.pending.is_empty() {
            tracing::trace!("simulated audio output ran dry");
            self.stats.underruns += 1;
            self.state = OutputState::Stopped;
        }
    }
}

// ============================================================================
// Video
// ============================================================================

pub trait VideoSink {
    /// Consume `frame` now; its planes may be invalid after this returns.
    fn present(&mut self, frame: &VideoFrame<'_>) -> Result<()>;
}

/// Counts frames and drops them.
#[derive(Debug, Default)]
pub struct NullVideoSink {
    pub presented: u64,
    pub last_timestamp: Option<f64>,
}

impl VideoSink for NullVideoSink {
    fn present(&mut self, frame: &VideoFrame<'_>) -> Result<()> {
        self.presented += 1;
        self.last_timestamp = Some(frame.timestamp);
        Ok(())
    }
}

/// Converts every presented frame into a reusable RGBA surface.
#[derive(Debug, Default)]
pub struct RgbaVideoSink {
    converter: PixelConverter,
    rgba: Vec<u8>,
    width: u32,
    height: u32,
    timestamp: f64,
    presented: u64,
}

impl RgbaVideoSink {
    pub fn new(converter: PixelConverter) -> Self {
        Self {
            converter,
            ..Default::default()
        }
    }

    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    /// Surface size; 1x1 before the first frame.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width.max(1), self.height.max(1))
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }
}

impl VideoSink for RgbaVideoSink {
    fn present(&mut self, frame: &VideoFrame<'_>) -> Result<()> {
        self.converter.yuv420_to_rgba(frame, &mut self.rgba)?;
        self.width = frame.width;
        self.height = frame.height;
        self.timestamp = frame.timestamp;
        self.presented += 1;
        Ok(())
    }
}
