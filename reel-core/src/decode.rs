//! # Video Decoding Adapter
//!
//! Wraps an H.264 decoding engine behind the [`VideoEngine`] trait and turns
//! its output into [`VideoFrame`] values.
//!
//! Frames come in two flavours, tagged by [`FrameOwnership`]:
//! - `BorrowedFromEngine`: planes point straight into the engine's picture
//!   buffers, with the engine's (possibly padded) strides. The adapter makes
//!   no copy, but `OpenH264Engine` itself copies each picture once into
//!   engine-owned planes, since openh264's `DecodedYUV` borrows the decoder.
//! - `OwnedByPool`: planes were copied row by row into a contiguous buffer
//!   taken from the adapter's [`BufferPool`] (stride == width).
//!
//! Either way a `VideoFrame` borrows the adapter, so it cannot outlive the
//! next call to [`VideoDecoder::decode`].
//!
//! ## State machine
//!
//! ```text
//! Uninitialized --initialize()--> Initialized --SPS/PPS--> Initialized(configured)
//!       ^                              |
//!       +-----------destroy()----------+
//! ```

use serde::Serialize;

use crate::error::{EngineError, Error, ErrorSlot, Result};
use crate::pool::{BufferPool, PoolStats};

// ============================================================================
// Engine seam
// ============================================================================

/// Options applied when an engine instance is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoEngineOptions {
    /// Substitute the previous good region on corruption instead of failing.
    pub error_concealment: bool,
}

impl Default for VideoEngineOptions {
    fn default() -> Self {
        Self {
            error_concealment: true,
        }
    }
}

/// Outcome of feeding one unit to an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    /// A new picture is available through [`VideoEngine::picture`].
    Picture,
    /// Unit consumed, nothing to show yet.
    NoOutput,
}

/// Planes of an engine-owned picture.
#[derive(Debug, Clone, Copy)]
pub struct Picture<'a> {
    pub y: &'a [u8],
    pub u: &'a [u8],
    pub v: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub y_stride: usize,
    pub uv_stride: usize,
}

impl<'a> Picture<'a> {
    pub fn chroma_width(&self) -> usize {
        (self.width as usize + 1) / 2
    }

    pub fn chroma_height(&self) -> usize {
        (self.height as usize + 1) / 2
    }

    /// Dimensions are non-zero and every plane covers its rows.
    pub fn is_valid(&self) -> bool {
        let (w, h) = (self.width as usize, self.height as usize);
        if w == 0 || h == 0 || self.y_stride < w || self.uv_stride < self.chroma_width() {
            return false;
        }
        let y_need = self.y_stride * (h - 1) + w;
        let uv_need = self.uv_stride * (self.chroma_height() - 1) + self.chroma_width();
        self.y.len() >= y_need && self.u.len() >= uv_need && self.v.len() >= uv_need
    }
}

/// An H.264 decoding engine.
pub trait VideoEngine: Send {
    fn name(&self) -> &'static str;

    /// Feed one start-code-delimited unit.
    fn decode(&mut self, annexb: &[u8]) -> std::result::Result<EngineStatus, EngineError>;

    /// Most recent picture. Replaced by the next `decode` that emits one.
    fn picture(&self) -> Option<Picture<'_>>;

    /// Push an empty input through the engine to drop damaged state.
    fn flush(&mut self);
}

/// Creates engine instances. Called on `initialize` and on every `reset`.
pub type VideoEngineFactory =
    Box<dyn Fn(&VideoEngineOptions) -> std::result::Result<Box<dyn VideoEngine>, EngineError> + Send>;

// ============================================================================
// Frames
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FrameOwnership {
    /// Planes alias engine memory and are invalidated by the next decode.
    BorrowedFromEngine,
    /// Planes live in a pool buffer owned by the adapter.
    OwnedByPool,
}

/// Geometry of the adapter's current output, without the planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameLayout {
    pub width: u32,
    pub height: u32,
    pub y_stride: usize,
    pub uv_stride: usize,
    pub ownership: FrameOwnership,
}

/// Decoded planar YUV 4:2:0 picture.
#[derive(Debug, Clone, Copy)]
pub struct VideoFrame<'a> {
    pub y: &'a [u8],
    pub u: &'a [u8],
    pub v: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub y_stride: usize,
    pub uv_stride: usize,
    /// Presentation time in seconds.
    pub timestamp: f64,
    pub ownership: FrameOwnership,
}

impl<'a> VideoFrame<'a> {
    pub fn is_valid(&self) -> bool {
        !self.y.is_empty()
            && !self.u.is_empty()
            && !self.v.is_empty()
            && self.width > 0
            && self.height > 0
    }

    pub fn is_zero_copy(&self) -> bool {
        self.ownership == FrameOwnership::BorrowedFromEngine
    }

    pub fn chroma_width(&self) -> usize {
        (self.width as usize + 1) / 2
    }

    pub fn chroma_height(&self) -> usize {
        (self.height as usize + 1) / 2
    }

    /// Visible bytes of luma row `row`.
    pub fn y_row(&self, row: usize) -> &'a [u8] {
        let start = row * self.y_stride;
        &self.y[start..start + self.width as usize]
    }

    pub fn u_row(&self, row: usize) -> &'a [u8] {
        let start = row * self.uv_stride;
        &self.u[start..start + self.chroma_width()]
    }

    pub fn v_row(&self, row: usize) -> &'a [u8] {
        let start = row * self.uv_stride;
        &self.v[start..start + self.chroma_width()]
    }

    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecoderInfo {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VideoDecoderStats {
    pub units: u64,
    pub frames: u64,
    pub no_output: u64,
    pub corrupt_units: u64,
    pub flushes: u64,
    pub resets: u64,
}

// ============================================================================
// Adapter
// ============================================================================

pub struct VideoDecoder {
    factory: VideoEngineFactory,
    options: VideoEngineOptions,
    engine: Option<Box<dyn VideoEngine>>,
    pool: BufferPool,
    /// Contiguous I420 copy of the last picture when compact output is on.
    compact: Option<Vec<u8>>,
    require_compact: bool,
    output: Option<FrameLayout>,
    info: Option<DecoderInfo>,
    stats: VideoDecoderStats,
    error: ErrorSlot,
}

impl std::fmt::Debug for VideoDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoDecoder")
            .field("engine", &self.engine.as_ref().map(|e| e.name()))
            .field("require_compact", &self.require_compact)
            .field("output", &self.output)
            .field("stats", &self.stats)
            .finish()
    }
}

impl VideoDecoder {
    pub fn new(factory: VideoEngineFactory, options: VideoEngineOptions, pool_depth: usize) -> Self {
        Self {
            factory,
            options,
            engine: None,
            pool: BufferPool::new(pool_depth),
            compact: None,
            require_compact: false,
            output: None,
            info: None,
            stats: VideoDecoderStats::default(),
            error: ErrorSlot::new(),
        }
    }

    /// Adapter backed by the OpenH264 software decoder.
    #[cfg(feature = "software-decode")]
    pub fn openh264(options: VideoEngineOptions) -> Self {
        Self::new(openh264_factory(), options, crate::pool::DEFAULT_POOL_DEPTH)
    }

    pub fn initialize(&mut self) -> Result<()> {
        let result = self.create_engine();
        self.error.track(result)
    }

    fn create_engine(&mut self) -> Result<()> {
        let engine = (self.factory)(&self.options)
            .map_err(|e| Error::DecoderInitFailed(format!("video engine: {}", e)))?;
        tracing::debug!(
            "video engine '{}' created (concealment: {})",
            engine.name(),
            self.options.error_concealment
        );
        self.engine = Some(engine);
        self.output = None;
        self.error.clear();
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.is_some()
    }

    pub fn engine_name(&self) -> Option<&'static str> {
        self.engine.as_ref().map(|e| e.name())
    }

    /// Contiguous planes instead of engine-strided ones.
    pub fn set_require_compact(&mut self, require: bool) {
        self.require_compact = require;
    }

    pub fn require_compact(&self) -> bool {
        self.require_compact
    }

    /// Feed one Annex B unit.
    ///
    /// `Ok(None)` covers every "nothing to show" case: the engine is still
    /// buffering, the unit was a parameter set, or the unit was corrupt and
    /// the engine has been flushed.
    pub fn decode(&mut self, annexb: &[u8]) -> Result<Option<FrameLayout>> {
        let result = self.decode_inner(annexb);
        self.error.track(result)
    }

    fn decode_inner(&mut self, annexb: &[u8]) -> Result<Option<FrameLayout>> {
        let engine = self
            .engine
            .as_mut()
            .ok_or_else(|| Error::DecoderInitFailed("video decoder not initialized".into()))?;
        if annexb.is_empty() {
            return Err(Error::InvalidParam("empty video unit".into()));
        }
        self.stats.units += 1;

        match engine.decode(annexb) {
            Ok(EngineStatus::Picture) => {}
            Ok(EngineStatus::NoOutput) => {
                self.stats.no_output += 1;
                return Ok(None);
            }
            Err(EngineError::NoParameterSets) | Err(EngineError::Concealed) => {
                self.stats.no_output += 1;
                return Ok(None);
            }
            Err(e) => {
                tracing::debug!("{}: {}, flushing", engine.name(), e);
                // Flushing drops the engine's picture, so a borrowed frame is
                // moved into the pool buffer to keep it readable.
                if let Some(FrameOwnership::BorrowedFromEngine) = self.output.map(|l| l.ownership) {
                    self.output = match engine.picture().filter(Picture::is_valid) {
                        Some(picture) => match store_compact(&self.pool, &mut self.compact, &picture) {
                            Ok(layout) => Some(layout),
                            Err(e) => {
                                tracing::warn!("could not keep last frame across flush: {}", e);
                                None
                            }
                        },
                        None => None,
                    };
                }
                engine.flush();
                self.stats.corrupt_units += 1;
                self.stats.flushes += 1;
                return Ok(None);
            }
        }

        let Some(picture) = engine.picture().filter(Picture::is_valid) else {
            tracing::warn!("{} reported a picture without usable planes", engine.name());
            self.stats.no_output += 1;
            return Ok(None);
        };

        let layout = if self.require_compact {
            store_compact(&self.pool, &mut self.compact, &picture)?
        } else {
            FrameLayout {
                width: picture.width,
                height: picture.height,
                y_stride: picture.y_stride,
                uv_stride: picture.uv_stride,
                ownership: FrameOwnership::BorrowedFromEngine,
            }
        };

        self.info = Some(DecoderInfo {
            width: layout.width,
            height: layout.height,
        });
        self.output = Some(layout);
        self.stats.frames += 1;
        Ok(Some(layout))
    }

    /// Planes of the most recent output. Timestamp is left at zero.
    pub fn frame(&self) -> Option<VideoFrame<'_>> {
        let layout = self.output?;
        match layout.ownership {
            FrameOwnership::BorrowedFromEngine => {
                let pic = self.engine.as_ref()?.picture()?;
                Some(VideoFrame {
                    y: pic.y,
                    u: pic.u,
                    v: pic.v,
                    width: pic.width,
                    height: pic.height,
                    y_stride: pic.y_stride,
                    uv_stride: pic.uv_stride,
                    timestamp: 0.0,
                    ownership: FrameOwnership::BorrowedFromEngine,
                })
            }
            FrameOwnership::OwnedByPool => {
                let buf = self.compact.as_ref()?;
                let (w, h) = (layout.width as usize, layout.height as usize);
                let (cw, ch) = (layout.uv_stride, (h + 1) / 2);
                let y_len = w * h;
                let uv_len = cw * ch;
                Some(VideoFrame {
                    y: &buf[..y_len],
                    u: &buf[y_len..y_len + uv_len],
                    v: &buf[y_len + uv_len..y_len + 2 * uv_len],
                    width: layout.width,
                    height: layout.height,
                    y_stride: w,
                    uv_stride: cw,
                    timestamp: 0.0,
                    ownership: FrameOwnership::OwnedByPool,
                })
            }
        }
    }

    pub fn output_layout(&self) -> Option<FrameLayout> {
        self.output
    }

    /// Last known dimensions; `None` until a frame has been decoded.
    pub fn decoder_info(&self) -> Option<DecoderInfo> {
        self.info
    }

    /// Recreate the engine, dropping all reference pictures.
    pub fn reset(&mut self) -> Result<()> {
        self.engine = None;
        self.output = None;
        self.stats.resets += 1;
        tracing::debug!("video decoder reset");
        let result = self.create_engine();
        self.error.track(result)
    }

    pub fn destroy(&mut self) {
        self.engine = None;
        self.output = None;
        if let Some(buf) = self.compact.take() {
            self.pool.release(buf);
        }
        self.pool.clear();
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn stats(&self) -> VideoDecoderStats {
        self.stats
    }

    pub fn last_error(&self) -> Option<crate::error::ErrorKind> {
        self.error.last_error()
    }

    pub fn last_message(&self) -> &str {
        self.error.last_message()
    }
}

impl Drop for VideoDecoder {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Copy `picture` into the adapter's contiguous buffer, growing it from the
/// pool when the frame no longer fits.
fn store_compact(
    pool: &BufferPool,
    slot: &mut Option<Vec<u8>>,
    picture: &Picture<'_>,
) -> Result<FrameLayout> {
    let (w, h) = (picture.width as usize, picture.height as usize);
    let (cw, ch) = (picture.chroma_width(), picture.chroma_height());
    let size = w * h + 2 * cw * ch;

    if slot.as_ref().map_or(true, |b| b.len() < size) {
        if let Some(old) = slot.take() {
            pool.release(old);
        }
        *slot = Some(pool.acquire(size)?);
    }
    let Some(dst) = slot.as_mut() else {
        return Err(Error::OutOfMemory("compact frame buffer".into()));
    };
    copy_compact(picture, dst);

    Ok(FrameLayout {
        width: picture.width,
        height: picture.height,
        y_stride: w,
        uv_stride: cw,
        ownership: FrameOwnership::OwnedByPool,
    })
}

/// Copy a strided picture into a contiguous I420 buffer.
fn copy_compact(picture: &Picture<'_>, dst: &mut [u8]) {
    let (w, h) = (picture.width as usize, picture.height as usize);
    let (cw, ch) = (picture.chroma_width(), picture.chroma_height());

    let (y_dst, rest) = dst.split_at_mut(w * h);
    let (u_dst, rest) = rest.split_at_mut(cw * ch);
    let v_dst = &mut rest[..cw * ch];

    for row in 0..h {
        let src = row * picture.y_stride;
        y_dst[row * w..(row + 1) * w].copy_from_slice(&picture.y[src..src + w]);
    }
    for row in 0..ch {
        let src = row * picture.uv_stride;
        u_dst[row * cw..(row + 1) * cw].copy_from_slice(&picture.u[src..src + cw]);
        v_dst[row * cw..(row + 1) * cw].copy_from_slice(&picture.v[src..src + cw]);
    }
}

// ============================================================================
// OpenH264 Software Engine
// ============================================================================

#[cfg(feature = "software-decode")]
pub use self::openh264_engine::{openh264_factory, OpenH264Engine};

#[cfg(feature = "software-decode")]
mod openh264_engine {
    use openh264::decoder::Decoder;
    use openh264::formats::YUVSource;

    use super::{EngineStatus, Picture, VideoEngine, VideoEngineFactory, VideoEngineOptions};
    use crate::error::EngineError;

    /// OpenH264 decoder. The library's picture borrows the decoder, so the
    /// planes are copied (with their native strides) into engine storage
    /// that stays put until the next picture.
    pub struct OpenH264Engine {
        decoder: Decoder,
        y: Vec<u8>,
        u: Vec<u8>,
        v: Vec<u8>,
        width: u32,
        height: u32,
        y_stride: usize,
        uv_stride: usize,
        has_picture: bool,
    }

    impl OpenH264Engine {
        pub fn new(options: &VideoEngineOptions) -> Result<Self, EngineError> {
            let decoder = Decoder::new().map_err(|e| EngineError::Create(e.to_string()))?;
            if !options.error_concealment {
                tracing::debug!("OpenH264 uses its built-in concealment mode");
            }
            Ok(Self {
                decoder,
                y: Vec::new(),
                u: Vec::new(),
                v: Vec::new(),
                width: 0,
                height: 0,
                y_stride: 0,
                uv_stride: 0,
                has_picture: false,
            })
        }
    }

    impl VideoEngine for OpenH264Engine {
        fn name(&self) -> &'static str {
            "OpenH264"
        }

        fn decode(&mut self, annexb: &[u8]) -> Result<EngineStatus, EngineError> {
            match self.decoder.decode(annexb) {
                Ok(Some(yuv)) => {
                    let (width, height) = yuv.dimensions();
                    let (y_stride, u_stride, v_stride) = yuv.strides();
                    let uv_rows = (height + 1) / 2;

                    let y = yuv.y();
                    let u = yuv.u();
                    let v = yuv.v();
                    self.y.clear();
                    self.y.extend_from_slice(&y[..(y_stride * height).min(y.len())]);
                    self.u.clear();
                    self.u.extend_from_slice(&u[..(u_stride * uv_rows).min(u.len())]);
                    self.v.clear();
                    self.v.extend_from_slice(&v[..(v_stride * uv_rows).min(v.len())]);

                    self.width = width as u32;
                    self.height = height as u32;
                    self.y_stride = y_stride;
                    self.uv_stride = u_stride.min(v_stride);
                    self.has_picture = true;
                    Ok(EngineStatus::Picture)
                }
                Ok(None) => Ok(EngineStatus::NoOutput),
                Err(e) => Err(EngineError::Corrupt(e.to_string())),
            }
        }

        fn picture(&self) -> Option<Picture<'_>> {
            if !self.has_picture {
                return None;
            }
            Some(Picture {
                y: &self.y,
                u: &self.u,
                v: &self.v,
                width: self.width,
                height: self.height,
                y_stride: self.y_stride,
                uv_stride: self.uv_stride,
            })
        }

        fn flush(&mut self) {
            // An empty input drains whatever the decoder is holding.
            let _ = self.decoder.decode(&[]);
        }
    }

    pub fn openh264_factory() -> VideoEngineFactory {
        Box::new(|options| {
            OpenH264Engine::new(options).map(|e| Box::new(e) as Box<dyn VideoEngine>)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testutil::{fake_video_factory, slice_unit, sps_unit, FakeVideoConfig, PPS_UNIT};

    fn decoder(config: FakeVideoConfig) -> VideoDecoder {
        let mut dec = VideoDecoder::new(fake_video_factory(config), VideoEngineOptions::default(), 3);
        dec.initialize().unwrap();
        dec
    }

    fn prime(dec: &mut VideoDecoder, w: u16, h: u16) {
        assert!(dec.decode(&sps_unit(w, h)).unwrap().is_none());
        assert!(dec.decode(PPS_UNIT).unwrap().is_none());
    }

    #[test]
    fn test_uninitialized_decode_fails() {
        let mut dec = VideoDecoder::new(
            fake_video_factory(FakeVideoConfig::default()),
            VideoEngineOptions::default(),
            3,
        );
        let err = dec.decode(&slice_unit(0, true)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecoderInitFailed);
        assert_eq!(dec.last_error(), Some(ErrorKind::DecoderInitFailed));
    }

    #[test]
    fn test_empty_input_is_invalid() {
        let mut dec = decoder(FakeVideoConfig::default());
        assert_eq!(dec.decode(&[]).unwrap_err().kind(), ErrorKind::InvalidParam);
    }

    #[test]
    fn test_zero_copy_frame() {
        let mut dec = decoder(FakeVideoConfig {
            stride_padding: 32,
            ..Default::default()
        });
        prime(&mut dec, 64, 48);
        assert!(dec.decoder_info().is_none());

        let layout = dec.decode(&slice_unit(7, true)).unwrap().unwrap();
        assert_eq!(layout.ownership, FrameOwnership::BorrowedFromEngine);
        assert_eq!(layout.y_stride, 64 + 32);

        let frame = dec.frame().unwrap();
        assert!(frame.is_valid());
        assert!(frame.is_zero_copy());
        assert_eq!(frame.y_row(0), &[7u8; 64][..]);
        assert_eq!(dec.decoder_info(), Some(DecoderInfo { width: 64, height: 48 }));
    }

    #[test]
    fn test_compact_frame_uses_pool() {
        let mut dec = decoder(FakeVideoConfig {
            stride_padding: 16,
            ..Default::default()
        });
        dec.set_require_compact(true);
        prime(&mut dec, 32, 16);

        for i in 0..10u32 {
            let layout = dec.decode(&slice_unit(i, i == 0)).unwrap().unwrap();
            assert_eq!(layout.ownership, FrameOwnership::OwnedByPool);
            assert_eq!(layout.y_stride, 32);
            let frame = dec.frame().unwrap();
            assert_eq!(frame.y.len(), 32 * 16);
            assert_eq!(frame.u.len(), 16 * 8);
            assert!(frame.y.iter().all(|&b| b == i as u8));
            assert!(frame.u.iter().all(|&b| b == 128));
        }
        // Same size every frame: one buffer for the whole run.
        assert_eq!(dec.pool_stats().allocations, 1);
    }

    #[test]
    fn test_compact_grows_with_frame_size() {
        let mut dec = decoder(FakeVideoConfig::default());
        dec.set_require_compact(true);
        prime(&mut dec, 16, 16);
        dec.decode(&slice_unit(0, true)).unwrap().unwrap();

        prime(&mut dec, 64, 64);
        dec.decode(&slice_unit(1, true)).unwrap().unwrap();
        let stats = dec.pool_stats();
        assert_eq!(stats.allocations, 2);
        assert_eq!(stats.pooled, 1);

        // Shrinking reuses the larger buffer.
        prime(&mut dec, 16, 16);
        dec.decode(&slice_unit(2, true)).unwrap().unwrap();
        assert_eq!(dec.pool_stats().allocations, 2);
        assert_eq!(dec.frame().unwrap().y.len(), 256);
    }

    #[test]
    fn test_odd_dimensions() {
        let mut dec = decoder(FakeVideoConfig::default());
        dec.set_require_compact(true);
        prime(&mut dec, 15, 9);
        dec.decode(&slice_unit(3, true)).unwrap().unwrap();
        let frame = dec.frame().unwrap();
        assert_eq!(frame.chroma_width(), 8);
        assert_eq!(frame.chroma_height(), 5);
        assert_eq!(frame.v.len(), 40);
        assert_eq!(frame.v_row(4).len(), 8);
    }

    #[test]
    fn test_no_parameter_sets_is_silent() {
        let mut dec = decoder(FakeVideoConfig::default());
        assert!(dec.decode(&slice_unit(0, true)).unwrap().is_none());
        assert!(dec.last_error().is_none());
        assert_eq!(dec.stats().flushes, 0);
    }

    #[test]
    fn test_latency_yields_no_output_first() {
        let mut dec = decoder(FakeVideoConfig {
            latency: 2,
            ..Default::default()
        });
        prime(&mut dec, 16, 16);
        assert!(dec.decode(&slice_unit(0, true)).unwrap().is_none());
        assert!(dec.decode(&slice_unit(1, false)).unwrap().is_none());
        assert!(dec.decode(&slice_unit(2, false)).unwrap().is_some());
        assert!(dec.last_error().is_none());
        assert_eq!(dec.stats().no_output, 4);
    }

    #[test]
    fn test_corrupt_unit_flushes_and_continues() {
        let mut dec = decoder(FakeVideoConfig::default());
        prime(&mut dec, 16, 16);
        assert!(dec.decode(&[0, 0, 0, 1, 0x41, 0xFF]).unwrap().is_none());
        assert_eq!(dec.stats().corrupt_units, 1);
        assert_eq!(dec.stats().flushes, 1);
        assert!(dec.last_error().is_none());
        assert!(dec.frame().is_none());

        assert!(dec.decode(&slice_unit(4, true)).unwrap().is_some());
    }

    #[test]
    fn test_last_frame_survives_corrupt_unit() {
        let mut dec = decoder(FakeVideoConfig {
            stride_padding: 8,
            corrupt_slices: Some((1, 2)),
            ..Default::default()
        });
        prime(&mut dec, 32, 16);
        let first = dec.decode(&slice_unit(0, true)).unwrap().unwrap();
        assert_eq!(first.ownership, FrameOwnership::BorrowedFromEngine);

        assert!(dec.decode(&slice_unit(1, false)).unwrap().is_none());
        assert_eq!(dec.stats().flushes, 1);
        let stale = dec.frame().unwrap();
        assert_eq!(stale.ownership, FrameOwnership::OwnedByPool);
        assert_eq!((stale.width, stale.height), (32, 16));
        assert!(stale.y.iter().all(|&b| b == 0));

        let next = dec.decode(&slice_unit(2, false)).unwrap().unwrap();
        assert_eq!(next.ownership, FrameOwnership::BorrowedFromEngine);
        assert_eq!(dec.frame().unwrap().y_row(0), &[2u8; 32][..]);
    }

    #[test]
    fn test_reset_drops_parameter_sets() {
        let mut dec = decoder(FakeVideoConfig::default());
        prime(&mut dec, 16, 16);
        assert!(dec.decode(&slice_unit(0, true)).unwrap().is_some());

        dec.reset().unwrap();
        assert!(dec.frame().is_none());
        assert!(dec.decode(&slice_unit(1, true)).unwrap().is_none());
        prime(&mut dec, 16, 16);
        assert!(dec.decode(&slice_unit(1, true)).unwrap().is_some());
        assert_eq!(dec.stats().resets, 1);
    }

    #[test]
    fn test_engine_creation_failure() {
        let mut dec = VideoDecoder::new(
            fake_video_factory(FakeVideoConfig {
                fail_create: true,
                ..Default::default()
            }),
            VideoEngineOptions::default(),
            3,
        );
        assert_eq!(dec.initialize().unwrap_err().kind(), ErrorKind::DecoderInitFailed);
        assert!(!dec.is_initialized());
    }

    #[test]
    fn test_destroy() {
        let mut dec = decoder(FakeVideoConfig::default());
        dec.set_require_compact(true);
        prime(&mut dec, 16, 16);
        dec.decode(&slice_unit(0, true)).unwrap();
        dec.destroy();
        assert!(!dec.is_initialized());
        assert!(dec.frame().is_none());
        assert_eq!(dec.pool_stats().pooled, 0);
    }
}
