// AUDIO DECODING ADAPTER
//
// Two-phase contract around an AAC engine:
//   initialize()                     → engine exists, optional knobs applied
//   configure_with_config_record()   → AudioSpecificConfig accepted
//   decode(payload)                  → interleaved i16 PCM, or "not enough bits"
//
// Sample rate and channel count are read back from the engine for every
// frame; a mid-stream format change shows up on the next frame.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Error, ErrorKind, ErrorSlot, Result};

// ============================================================================
// Engine seam
// ============================================================================

/// Optional engine parameters. Engines may reject any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioParam {
    MaxOutputChannels(u16),
    Limiter(bool),
    DynamicRangeControl(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioStatus {
    Frame,
    /// The engine needs more payload before it can emit a frame.
    NotEnoughBits,
}

/// Live stream description reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AudioStreamInfo {
    pub sample_rate: u32,
    pub channels: u16,
    /// Samples per channel in the last frame.
    pub frame_size: usize,
}

pub trait AudioEngine: Send {
    fn name(&self) -> &'static str;

    fn set_param(&mut self, param: AudioParam) -> std::result::Result<(), EngineError>;

    /// Accept an AudioSpecificConfig.
    fn configure(&mut self, config: &[u8]) -> std::result::Result<(), EngineError>;

    /// Append payload to the engine's input buffer.
    fn fill(&mut self, payload: &[u8]) -> std::result::Result<(), EngineError>;

    /// Decode one frame of interleaved samples into `out`.
    fn decode_frame(&mut self, out: &mut Vec<i16>) -> std::result::Result<AudioStatus, EngineError>;

    fn stream_info(&self) -> Option<AudioStreamInfo>;

    /// Drop buffered input.
    fn clear(&mut self);
}

pub type AudioEngineFactory =
    Box<dyn Fn() -> std::result::Result<Box<dyn AudioEngine>, EngineError> + Send>;

// ============================================================================
// Frames
// ============================================================================

/// Decoded interleaved PCM.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioFrame {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
    /// Presentation time in seconds.
    pub timestamp: f64,
}

impl AudioFrame {
    pub fn is_valid(&self) -> bool {
        !self.samples.is_empty() && self.sample_rate > 0 && self.channels > 0
    }

    /// Samples per channel.
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames() as f64 / self.sample_rate as f64
        }
    }
}

// ============================================================================
// Adapter
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioDecoderOptions {
    pub max_channels: u16,
    pub limiter: bool,
    pub drc: bool,
}

impl Default for AudioDecoderOptions {
    fn default() -> Self {
        Self {
            max_channels: 8,
            limiter: false,
            drc: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AudioDecoderStats {
    pub packets: u64,
    pub frames: u64,
    pub not_enough_bits: u64,
    pub errors: u64,
}

pub struct AudioDecoder {
    factory: AudioEngineFactory,
    options: AudioDecoderOptions,
    engine: Option<Box<dyn AudioEngine>>,
    configured: bool,
    scratch: Vec<i16>,
    stats: AudioDecoderStats,
    error: ErrorSlot,
}

impl std::fmt::Debug for AudioDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioDecoder")
            .field("engine", &self.engine.as_ref().map(|e| e.name()))
            .field("configured", &self.configured)
            .field("stats", &self.stats)
            .finish()
    }
}

impl AudioDecoder {
    pub fn new(factory: AudioEngineFactory, options: AudioDecoderOptions) -> Self {
        Self {
            factory,
            options,
            engine: None,
            configured: false,
            scratch: Vec::new(),
            stats: AudioDecoderStats::default(),
            error: ErrorSlot::new(),
        }
    }

    #[cfg(feature = "software-decode")]
    pub fn symphonia(options: AudioDecoderOptions) -> Self {
        Self::new(symphonia_factory(), options)
    }

    /// Create the engine and apply the optional parameters.
    pub fn initialize(&mut self) -> Result<()> {
        let result = self.create_engine();
        self.error.track(result)
    }

    fn create_engine(&mut self) -> Result<()> {
        let mut engine =
            (self.factory)().map_err(|e| Error::DecoderInitFailed(format!("audio engine: {}", e)))?;

        let params = [
            AudioParam::MaxOutputChannels(self.options.max_channels),
            AudioParam::Limiter(self.options.limiter),
            AudioParam::DynamicRangeControl(self.options.drc),
        ];
        for param in params {
            if let Err(e) = engine.set_param(param) {
                tracing::warn!("{}: {:?} not applied: {}", engine.name(), param, e);
            }
        }

        tracing::debug!("audio engine '{}' created", engine.name());
        self.engine = Some(engine);
        self.configured = false;
        self.error.clear();
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.is_some()
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Must succeed before `decode` is accepted.
    pub fn configure_with_config_record(&mut self, config: &[u8]) -> Result<()> {
        let result = self.configure_inner(config);
        self.error.track(result)
    }

    fn configure_inner(&mut self, config: &[u8]) -> Result<()> {
        let engine = self
            .engine
            .as_mut()
            .ok_or_else(|| Error::DecoderInitFailed("audio decoder not initialized".into()))?;
        if config.is_empty() {
            return Err(Error::InvalidParam("empty audio config record".into()));
        }
        engine
            .configure(config)
            .map_err(|e| Error::DecoderInitFailed(format!("audio config {:02x?}: {}", config, e)))?;
        self.configured = true;
        tracing::debug!("audio decoder configured with {:02x?}", config);
        Ok(())
    }

    /// Decode one payload. `Ok(None)` means the engine wants more input.
    pub fn decode(&mut self, payload: &[u8]) -> Result<Option<AudioFrame>> {
        let result = self.decode_inner(payload);
        if let Err(e) = &result {
            if e.kind() == ErrorKind::DecodeFailed {
                self.stats.errors += 1;
            }
        }
        self.error.track(result)
    }

    fn decode_inner(&mut self, payload: &[u8]) -> Result<Option<AudioFrame>> {
        let engine = self
            .engine
            .as_mut()
            .ok_or_else(|| Error::DecoderInitFailed("audio decoder not initialized".into()))?;
        if !self.configured {
            return Err(Error::InvalidParam(
                "audio decode requested before configuration".into(),
            ));
        }
        if payload.is_empty() {
            return Err(Error::InvalidParam("empty audio payload".into()));
        }
        self.stats.packets += 1;

        engine
            .fill(payload)
            .map_err(|e| Error::DecodeFailed(format!("{} fill: {}", engine.name(), e)))?;

        match engine.decode_frame(&mut self.scratch) {
            Ok(AudioStatus::NotEnoughBits) => {
                self.stats.not_enough_bits += 1;
                Ok(None)
            }
            Ok(AudioStatus::Frame) => {
                let info = engine.stream_info().ok_or_else(|| {
                    Error::DecodeFailed(format!("{} produced a frame without stream info", engine.name()))
                })?;
                let frame = AudioFrame {
                    samples: self.scratch.clone(),
                    sample_rate: info.sample_rate,
                    channels: info.channels,
                    timestamp: 0.0,
                };
                if !frame.is_valid() {
                    return Err(Error::DecodeFailed(format!(
                        "{} produced an empty frame ({} Hz, {} ch)",
                        engine.name(),
                        info.sample_rate,
                        info.channels
                    )));
                }
                self.stats.frames += 1;
                Ok(Some(frame))
            }
            Err(e) => Err(Error::DecodeFailed(format!("{}: {}", engine.name(), e))),
        }
    }

    /// Current stream description, if the engine has decoded anything.
    pub fn stream_info(&self) -> Option<AudioStreamInfo> {
        self.engine.as_ref().and_then(|e| e.stream_info())
    }

    /// Drop buffered input without recreating the engine.
    pub fn reset(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.clear();
        }
        self.scratch.clear();
        tracing::debug!("audio decoder reset");
    }

    pub fn destroy(&mut self) {
        self.engine = None;
        self.configured = false;
        self.scratch = Vec::new();
    }

    pub fn stats(&self) -> AudioDecoderStats {
        self.stats
    }

    pub fn last_error(&self) -> Option<ErrorKind> {
        self.error.last_error()
    }

    pub fn last_message(&self) -> &str {
        self.error.last_message()
    }
}

// ============================================================================
// Symphonia AAC Engine
// ============================================================================

#[cfg(feature = "software-decode")]
pub use self::symphonia_engine::{symphonia_factory, SymphoniaAacEngine};

#[cfg(feature = "software-decode")]
mod symphonia_engine {
    use symphonia::core::audio::{Channels, SampleBuffer};
    use symphonia::core::codecs::{CodecParameters, Decoder, DecoderOptions, CODEC_TYPE_AAC};
    use symphonia::core::formats::Packet;

    use super::{AudioEngine, AudioEngineFactory, AudioParam, AudioStatus, AudioStreamInfo};
    use crate::aac::AudioSpecificConfig;
    use crate::error::EngineError;

    /// Raw AAC access units decoded with symphonia.
    pub struct SymphoniaAacEngine {
        decoder: Option<Box<dyn Decoder>>,
        pending: Vec<u8>,
        info: Option<AudioStreamInfo>,
        max_channels: u16,
        next_ts: u64,
    }

    impl SymphoniaAacEngine {
        pub fn new() -> Self {
            Self {
                decoder: None,
                pending: Vec::new(),
                info: None,
                max_channels: 8,
                next_ts: 0,
            }
        }
    }

    impl Default for SymphoniaAacEngine {
        fn default() -> Self {
            Self::new()
        }
    }

    fn channel_mask(count: u16) -> Option<Channels> {
        match count {
            1 => Some(Channels::FRONT_LEFT),
            2 => Some(Channels::FRONT_LEFT | Channels::FRONT_RIGHT),
            _ => None,
        }
    }

    impl AudioEngine for SymphoniaAacEngine {
        fn name(&self) -> &'static str {
            "symphonia-aac"
        }

        fn set_param(&mut self, param: AudioParam) -> Result<(), EngineError> {
            match param {
                AudioParam::MaxOutputChannels(n) if n > 0 => {
                    self.max_channels = n;
                    Ok(())
                }
                AudioParam::MaxOutputChannels(_) => {
                    Err(EngineError::Unsupported("zero output channels".into()))
                }
                AudioParam::Limiter(false) | AudioParam::DynamicRangeControl(false) => Ok(()),
                AudioParam::Limiter(true) => Err(EngineError::Unsupported("limiter".into())),
                AudioParam::DynamicRangeControl(true) => {
                    Err(EngineError::Unsupported("dynamic range control".into()))
                }
            }
        }

        fn configure(&mut self, config: &[u8]) -> Result<(), EngineError> {
            let asc = AudioSpecificConfig::parse(config)
                .map_err(|e| EngineError::Config(e.to_string()))?;

            let mut params = CodecParameters::new();
            params
                .for_codec(CODEC_TYPE_AAC)
                .with_sample_rate(asc.sample_rate())
                .with_extra_data(config.to_vec().into_boxed_slice());
            if let Some(mask) = channel_mask(asc.channels()) {
                params.with_channels(mask);
            }

            let decoder = symphonia::default::get_codecs()
                .make(&params, &DecoderOptions::default())
                .map_err(|e| EngineError::Config(format!("symphonia: {}", e)))?;
            self.decoder = Some(decoder);
            self.pending.clear();
            self.next_ts = 0;
            Ok(())
        }

        fn fill(&mut self, payload: &[u8]) -> Result<(), EngineError> {
            self.pending.extend_from_slice(payload);
            Ok(())
        }

        fn decode_frame(&mut self, out: &mut Vec<i16>) -> Result<AudioStatus, EngineError> {
            let decoder = self
                .decoder
                .as_mut()
                .ok_or_else(|| EngineError::Config("decoder not configured".into()))?;
            if self.pending.is_empty() {
                return Ok(AudioStatus::NotEnoughBits);
            }

            let packet = Packet::new_from_slice(0, self.next_ts, 0, &self.pending);
            self.pending.clear();

            let decoded = decoder
                .decode(&packet)
                .map_err(|e| EngineError::Corrupt(e.to_string()))?;

            let spec = *decoded.spec();
            let frames = decoded.frames();
            if frames == 0 {
                return Ok(AudioStatus::NotEnoughBits);
            }
            let mut buf = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
            buf.copy_interleaved_ref(decoded);

            let channels = spec.channels.count();
            let keep = channels.min(self.max_channels as usize);
            out.clear();
            if keep == channels {
                out.extend_from_slice(buf.samples());
            } else {
                for frame in buf.samples().chunks_exact(channels) {
                    out.extend_from_slice(&frame[..keep]);
                }
            }

            self.next_ts += frames as u64;
            self.info = Some(AudioStreamInfo {
                sample_rate: spec.rate,
                channels: keep as u16,
                frame_size: frames,
            });
            Ok(AudioStatus::Frame)
        }

        fn stream_info(&self) -> Option<AudioStreamInfo> {
            self.info
        }

        fn clear(&mut self) {
            self.pending.clear();
            if let Some(decoder) = self.decoder.as_mut() {
                decoder.reset();
            }
        }
    }

    pub fn symphonia_factory() -> AudioEngineFactory {
        Box::new(|| Ok(Box::new(SymphoniaAacEngine::new()) as Box<dyn AudioEngine>))
    }
}
