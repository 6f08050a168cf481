//! # Reel Core
//!
//! MP4 (H.264 + AAC) decode and A/V sync pipeline.
//!
//! ```text
//! ByteSource -> Mp4Demuxer -> samples -> VideoDecoder / AudioDecoder
//!                                              |
//!                     PlaybackSession <- DecoderOrchestrator
//!                            |
//!                       SyncDriver -> AudioOutput / VideoSink
//! ```

// ============================================================================
// Errors / Config
// ============================================================================
pub mod error;
pub mod config;

// ============================================================================
// Container
// ============================================================================
pub mod source;
pub mod mp4_demux;
pub mod h264_utils;
pub mod aac;

// ============================================================================
// Decoders
// ============================================================================
pub mod pool;
pub mod decode;
pub mod audio;
pub mod pipeline;

// ============================================================================
// Playback
// ============================================================================
pub mod session;
pub mod sync;
pub mod output;
pub mod pixel_convert;

#[cfg(test)]
mod testutil;

pub use audio::{AudioDecoder, AudioFrame};
pub use config::ReelConfig;
pub use decode::{FrameOwnership, VideoDecoder, VideoFrame};
pub use error::{Error, ErrorKind, Result};
pub use mp4_demux::{FileInfo, Mp4Demuxer, Sample, Track};
pub use output::{AudioOutput, NullVideoSink, RgbaVideoSink, SimulatedAudioOutput, VideoSink};
pub use pipeline::DecoderOrchestrator;
pub use pixel_convert::{ColorRange, ColorSpace, PixelConverter};
pub use session::{PlaybackSession, SessionState};
pub use sync::{SyncDriver, SyncStats};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
