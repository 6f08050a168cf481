//! Test fixtures: a small MP4 writer and deterministic fake codec engines.
//!
//! Payloads carry their sample index so tests can check ordering end to end.
//! Index bytes always have the high bit set, which keeps them clear of
//! Annex B start codes.

use std::collections::VecDeque;

use crate::aac::AudioSpecificConfig;
use crate::audio::{
    AudioEngine, AudioEngineFactory, AudioParam, AudioStatus, AudioStreamInfo,
};
use crate::decode::{EngineStatus, Picture, VideoEngine, VideoEngineFactory};
use crate::error::EngineError;

pub const AAC_FRAME_SAMPLES: u32 = 1024;

const START_CODE: [u8; 4] = [0, 0, 0, 1];

pub fn encode_index(idx: u32) -> [u8; 4] {
    [
        0x80 | ((idx >> 21) & 0x7F) as u8,
        0x80 | ((idx >> 14) & 0x7F) as u8,
        0x80 | ((idx >> 7) & 0x7F) as u8,
        0x80 | (idx & 0x7F) as u8,
    ]
}

pub fn decode_index(bytes: &[u8]) -> Option<u32> {
    if bytes.len() < 4 || bytes[..4].iter().any(|b| b & 0x80 == 0) {
        return None;
    }
    Some(bytes[..4].iter().fold(0u32, |acc, b| (acc << 7) | (b & 0x7F) as u32))
}

fn sps_nal(width: u16, height: u16) -> Vec<u8> {
    let mut nal = vec![0x67, 0x42];
    nal.extend_from_slice(&encode_index(width as u32));
    nal.extend_from_slice(&encode_index(height as u32));
    nal
}

const PPS_NAL: [u8; 3] = [0x68, 0xCE, 0x80];

/// Slice NAL without a start code or length prefix.
fn slice_nal(idx: u32, idr: bool) -> Vec<u8> {
    let mut nal = vec![if idr { 0x65 } else { 0x41 }];
    nal.extend_from_slice(&encode_index(idx));
    // Vary the size so chunks are not all alike.
    nal.extend(std::iter::repeat(0xAB).take(64 + (idx as usize % 7) * 8));
    nal
}

pub fn sps_unit(width: u16, height: u16) -> Vec<u8> {
    let mut unit = START_CODE.to_vec();
    unit.extend_from_slice(&sps_nal(width, height));
    unit
}

pub const PPS_UNIT: &[u8] = &[0, 0, 0, 1, 0x68, 0xCE, 0x80];

pub fn slice_unit(idx: u32, idr: bool) -> Vec<u8> {
    let mut unit = START_CODE.to_vec();
    unit.extend_from_slice(&slice_nal(idx, idr));
    unit
}

/// Index carried by a length-prefixed video sample.
pub fn video_frame_index(avcc: &[u8]) -> Option<u32> {
    let nal = avcc.get(4..)?;
    decode_index(nal.get(1..)?)
}

pub fn audio_payload(idx: u32) -> Vec<u8> {
    let mut payload = vec![0x21];
    payload.extend_from_slice(&encode_index(idx));
    payload.extend(std::iter::repeat(0x5A).take(8));
    payload
}

pub fn audio_frame_index(payload: &[u8]) -> Option<u32> {
    if payload.first() != Some(&0x21) {
        return None;
    }
    decode_index(&payload[1..])
}

// ============================================================================
// MP4 writer
// ============================================================================

/// Description of a synthetic movie. Video is track 1, audio track 2.
#[derive(Debug, Clone)]
pub struct MovieSpec {
    pub duration_secs: f64,
    pub video: bool,
    pub audio: bool,
    pub width: u16,
    pub height: u16,
    pub fps: u32,
    pub video_timescale: u32,
    pub keyframe_interval: u32,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples_per_chunk: u32,
    pub use_co64: bool,
    pub mdhd_v1: bool,
    /// Write an avcC with no parameter sets.
    pub empty_avcc: bool,
}

impl Default for MovieSpec {
    fn default() -> Self {
        Self {
            duration_secs: 10.0,
            video: true,
            audio: true,
            width: 320,
            height: 240,
            fps: 30,
            video_timescale: 90_000,
            keyframe_interval: 30,
            sample_rate: 44_100,
            channels: 2,
            samples_per_chunk: 1,
            use_co64: false,
            mdhd_v1: false,
            empty_avcc: false,
        }
    }
}

struct TrackPlan {
    track_id: u32,
    video: bool,
    timescale: u32,
    delta: u32,
    samples: Vec<Vec<u8>>,
}

impl TrackPlan {
    fn duration_ticks(&self) -> u64 {
        self.samples.len() as u64 * self.delta as u64
    }
}

fn bx(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 8);
    out.extend_from_slice(&((payload.len() + 8) as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(payload);
    out
}

fn full_box(kind: &[u8; 4], version: u8, payload: &[u8]) -> Vec<u8> {
    let mut body = vec![version, 0, 0, 0];
    body.extend_from_slice(payload);
    bx(kind, &body)
}

fn be32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn be16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

impl MovieSpec {
    fn plans(&self) -> Vec<TrackPlan> {
        let mut plans = Vec::new();
        if self.video {
            let count = (self.duration_secs * self.fps as f64).round() as u32;
            let interval = self.keyframe_interval.max(1);
            let samples = (0..count)
                .map(|i| {
                    let nal = slice_nal(i, i % interval == 0);
                    let mut sample = (nal.len() as u32).to_be_bytes().to_vec();
                    sample.extend_from_slice(&nal);
                    sample
                })
                .collect();
            plans.push(TrackPlan {
                track_id: 1,
                video: true,
                timescale: self.video_timescale,
                delta: self.video_timescale / self.fps,
                samples,
            });
        }
        if self.audio {
            let total = self.duration_secs * self.sample_rate as f64;
            let count = (total / AAC_FRAME_SAMPLES as f64).ceil() as u32;
            plans.push(TrackPlan {
                track_id: 2,
                video: false,
                timescale: self.sample_rate,
                delta: AAC_FRAME_SAMPLES,
                samples: (0..count).map(audio_payload).collect(),
            });
        }
        plans
    }

    /// Serialize to an in-memory MP4: ftyp, moov, then an interleaved mdat.
    pub fn build(&self) -> Vec<u8> {
        let plans = self.plans();
        let spc = self.samples_per_chunk.max(1) as usize;

        // (start time, plan index, first sample, sample count)
        let mut chunks: Vec<(f64, usize, usize, usize)> = Vec::new();
        for (p, plan) in plans.iter().enumerate() {
            for first in (0..plan.samples.len()).step_by(spc) {
                let n = spc.min(plan.samples.len() - first);
                let t = first as f64 * plan.delta as f64 / plan.timescale as f64;
                chunks.push((t, p, first, n));
            }
        }
        chunks.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut mdat_payload = Vec::new();
        let mut relative: Vec<Vec<u64>> = vec![Vec::new(); plans.len()];
        for &(_, p, first, n) in &chunks {
            relative[p].push(mdat_payload.len() as u64);
            for sample in &plans[p].samples[first..first + n] {
                mdat_payload.extend_from_slice(sample);
            }
        }

        let ftyp = {
            let mut p = b"isom".to_vec();
            be32(&mut p, 0x200);
            p.extend_from_slice(b"isomiso2avc1mp41");
            bx(b"ftyp", &p)
        };

        // Offsets do not change the moov size, so a dry run gives the layout.
        let dry = self.moov(&plans, &relative, 0);
        let base = (ftyp.len() + dry.len() + 8) as u64;
        let moov = self.moov(&plans, &relative, base);

        let mut out = ftyp;
        out.extend_from_slice(&moov);
        out.extend_from_slice(&bx(b"mdat", &mdat_payload));
        out
    }

    fn moov(&self, plans: &[TrackPlan], relative: &[Vec<u64>], base: u64) -> Vec<u8> {
        let movie_duration = plans
            .iter()
            .map(|p| p.duration_ticks() as f64 / p.timescale as f64)
            .fold(0.0f64, f64::max);

        let mut mvhd = Vec::new();
        be32(&mut mvhd, 0); // creation
        be32(&mut mvhd, 0); // modification
        be32(&mut mvhd, 1000);
        be32(&mut mvhd, (movie_duration * 1000.0) as u32);
        be32(&mut mvhd, 0x0001_0000); // rate
        be16(&mut mvhd, 0x0100); // volume
        mvhd.extend_from_slice(&[0; 10]);
        mvhd.extend_from_slice(&[0; 36]); // matrix
        mvhd.extend_from_slice(&[0; 24]);
        be32(&mut mvhd, plans.len() as u32 + 1);

        let mut payload = full_box(b"mvhd", 0, &mvhd);
        for (plan, offsets) in plans.iter().zip(relative) {
            let offsets: Vec<u64> = offsets.iter().map(|o| o + base).collect();
            payload.extend_from_slice(&self.trak(plan, &offsets));
        }
        bx(b"moov", &payload)
    }

    fn trak(&self, plan: &TrackPlan, chunk_offsets: &[u64]) -> Vec<u8> {
        let mut tkhd = Vec::new();
        be32(&mut tkhd, 0);
        be32(&mut tkhd, 0);
        be32(&mut tkhd, plan.track_id);
        be32(&mut tkhd, 0);
        be32(&mut tkhd, 0); // duration (movie timescale), unused
        tkhd.extend_from_slice(&[0; 52]);
        if plan.video {
            be32(&mut tkhd, (self.width as u32) << 16);
            be32(&mut tkhd, (self.height as u32) << 16);
        } else {
            be32(&mut tkhd, 0);
            be32(&mut tkhd, 0);
        }

        let mut mdhd = Vec::new();
        if self.mdhd_v1 {
            mdhd.extend_from_slice(&[0; 16]);
            be32(&mut mdhd, plan.timescale);
            mdhd.extend_from_slice(&plan.duration_ticks().to_be_bytes());
        } else {
            mdhd.extend_from_slice(&[0; 8]);
            be32(&mut mdhd, plan.timescale);
            be32(&mut mdhd, plan.duration_ticks() as u32);
        }
        mdhd.extend_from_slice(&[0x55, 0xC4, 0, 0]); // language "und"

        let mut hdlr = Vec::new();
        be32(&mut hdlr, 0);
        hdlr.extend_from_slice(if plan.video { b"vide" } else { b"soun" });
        hdlr.extend_from_slice(&[0; 12]);
        hdlr.extend_from_slice(if plan.video { b"Video\0" } else { b"Sound\0" });

        let stbl = self.stbl(plan, chunk_offsets);
        let minf = bx(b"minf", &stbl);

        let mut mdia = full_box(b"mdhd", u8::from(self.mdhd_v1), &mdhd);
        mdia.extend_from_slice(&full_box(b"hdlr", 0, &hdlr));
        mdia.extend_from_slice(&minf);

        let mut trak = full_box(b"tkhd", 0, &tkhd);
        trak.extend_from_slice(&bx(b"mdia", &mdia));
        bx(b"trak", &trak)
    }

    fn stbl(&self, plan: &TrackPlan, chunk_offsets: &[u64]) -> Vec<u8> {
        let mut stsd = Vec::new();
        be32(&mut stsd, 1);
        stsd.extend_from_slice(&if plan.video {
            self.avc1_entry()
        } else {
            self.mp4a_entry()
        });

        let mut stts = Vec::new();
        be32(&mut stts, 1);
        be32(&mut stts, plan.samples.len() as u32);
        be32(&mut stts, plan.delta);

        let spc = self.samples_per_chunk.max(1);
        let count = plan.samples.len() as u32;
        let full_chunks = count / spc;
        let remainder = count % spc;
        let mut stsc_entries = vec![(1u32, spc)];
        if remainder != 0 && full_chunks > 0 {
            stsc_entries.push((full_chunks + 1, remainder));
        } else if remainder != 0 {
            stsc_entries[0].1 = remainder;
        }
        let mut stsc = Vec::new();
        be32(&mut stsc, stsc_entries.len() as u32);
        for (first, n) in stsc_entries {
            be32(&mut stsc, first);
            be32(&mut stsc, n);
            be32(&mut stsc, 1);
        }

        let mut stsz = Vec::new();
        be32(&mut stsz, 0);
        be32(&mut stsz, count);
        for sample in &plan.samples {
            be32(&mut stsz, sample.len() as u32);
        }

        let mut co = Vec::new();
        be32(&mut co, chunk_offsets.len() as u32);
        for &offset in chunk_offsets {
            if self.use_co64 {
                co.extend_from_slice(&offset.to_be_bytes());
            } else {
                be32(&mut co, offset as u32);
            }
        }

        let mut out = full_box(b"stsd", 0, &stsd);
        out.extend_from_slice(&full_box(b"stts", 0, &stts));
        out.extend_from_slice(&full_box(b"stsc", 0, &stsc));
        out.extend_from_slice(&full_box(b"stsz", 0, &stsz));
        out.extend_from_slice(&full_box(if self.use_co64 { b"co64" } else { b"stco" }, 0, &co));

        if plan.video {
            let interval = self.keyframe_interval.max(1);
            let keys: Vec<u32> = (0..count).filter(|i| i % interval == 0).map(|i| i + 1).collect();
            let mut stss = Vec::new();
            be32(&mut stss, keys.len() as u32);
            for k in keys {
                be32(&mut stss, k);
            }
            out.extend_from_slice(&full_box(b"stss", 0, &stss));
        }
        bx(b"stbl", &out)
    }

    fn avc1_entry(&self) -> Vec<u8> {
        let mut avcc = vec![1, 0x42, 0xC0, 0x1E, 0xFF];
        if self.empty_avcc {
            avcc.extend_from_slice(&[0xE0, 0]);
        } else {
            let sps = sps_nal(self.width, self.height);
            avcc.push(0xE1);
            be16(&mut avcc, sps.len() as u16);
            avcc.extend_from_slice(&sps);
            avcc.push(1);
            be16(&mut avcc, PPS_NAL.len() as u16);
            avcc.extend_from_slice(&PPS_NAL);
        }

        let mut entry = vec![0; 6];
        be16(&mut entry, 1); // data_reference_index
        entry.extend_from_slice(&[0; 16]);
        be16(&mut entry, self.width);
        be16(&mut entry, self.height);
        be32(&mut entry, 0x0048_0000);
        be32(&mut entry, 0x0048_0000);
        be32(&mut entry, 0);
        be16(&mut entry, 1); // frame count
        entry.extend_from_slice(&[0; 32]);
        be16(&mut entry, 0x18);
        be16(&mut entry, 0xFFFF);
        entry.extend_from_slice(&bx(b"avcC", &avcc));
        bx(b"avc1", &entry)
    }

    fn mp4a_entry(&self) -> Vec<u8> {
        let asc = AudioSpecificConfig::synthesize(self.sample_rate, self.channels).to_bytes();

        let mut dec_config = vec![0x40, 0x15, 0, 0, 0];
        dec_config.extend_from_slice(&[0; 8]); // bitrates
        dec_config.extend_from_slice(&[0x05, asc.len() as u8]);
        dec_config.extend_from_slice(&asc);

        let mut es = vec![0x00, 0x02, 0x00]; // ES_ID, flags
        es.push(0x04);
        es.push(dec_config.len() as u8);
        es.extend_from_slice(&dec_config);
        es.extend_from_slice(&[0x06, 0x01, 0x02]);

        let mut esds = vec![0x03, es.len() as u8];
        esds.extend_from_slice(&es);

        let mut entry = vec![0; 6];
        be16(&mut entry, 1);
        be16(&mut entry, 0); // version
        entry.extend_from_slice(&[0; 6]);
        be16(&mut entry, self.channels);
        be16(&mut entry, 16);
        be32(&mut entry, 0);
        be32(&mut entry, self.sample_rate << 16);
        entry.extend_from_slice(&full_box(b"esds", 0, &esds));
        bx(b"mp4a", &entry)
    }
}

/// Write a movie to a temporary file that lives as long as the handle.
pub fn movie_file(spec: &MovieSpec) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    std::io::Write::write_all(&mut file, &spec.build()).expect("write movie");
    file
}

// ============================================================================
// Fake video engine
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct FakeVideoConfig {
    /// Extra bytes at the end of every luma row (half as much on chroma).
    pub stride_padding: usize,
    /// Slices held back before the first picture comes out.
    pub latency: usize,
    pub fail_create: bool,
    /// Slice indices in `[start, end)` are reported as corrupt.
    pub corrupt_slices: Option<(u32, u32)>,
}

/// Emits a picture per slice with luma filled by the slice index.
pub struct FakeVideoEngine {
    config: FakeVideoConfig,
    dims: Option<(usize, usize)>,
    has_pps: bool,
    pending: VecDeque<u32>,
    y: Vec<u8>,
    u: Vec<u8>,
    v: Vec<u8>,
    shown: Option<(usize, usize)>,
}

impl FakeVideoEngine {
    pub fn new(config: FakeVideoConfig) -> Self {
        Self {
            config,
            dims: None,
            has_pps: false,
            pending: VecDeque::new(),
            y: Vec::new(),
            u: Vec::new(),
            v: Vec::new(),
            shown: None,
        }
    }

    fn render(&mut self, idx: u32, w: usize, h: usize) {
        let pad = self.config.stride_padding;
        let (cw, ch) = ((w + 1) / 2, (h + 1) / 2);
        let (ys, cs) = (w + pad, cw + pad / 2);

        self.y = vec![0xEE; ys * h];
        for row in self.y.chunks_mut(ys) {
            row[..w].fill(idx as u8);
        }
        self.u = vec![0xEE; cs * ch];
        for row in self.u.chunks_mut(cs) {
            row[..cw].fill(128);
        }
        self.v = self.u.clone();
        self.shown = Some((w, h));
    }
}

fn split_units(annexb: &[u8]) -> Vec<&[u8]> {
    let starts: Vec<usize> = annexb
        .windows(4)
        .enumerate()
        .filter(|(_, w)| *w == START_CODE)
        .map(|(i, _)| i)
        .collect();
    starts
        .iter()
        .enumerate()
        .map(|(n, &s)| {
            let end = starts.get(n + 1).copied().unwrap_or(annexb.len());
            &annexb[s + 4..end]
        })
        .collect()
}

impl VideoEngine for FakeVideoEngine {
    fn name(&self) -> &'static str {
        "fake-h264"
    }

    fn decode(&mut self, annexb: &[u8]) -> Result<EngineStatus, EngineError> {
        for nal in split_units(annexb) {
            let Some(&header) = nal.first() else { continue };
            match header & 0x1F {
                7 => {
                    let w = decode_index(nal.get(2..).unwrap_or_default());
                    let h = decode_index(nal.get(6..).unwrap_or_default());
                    match (w, h) {
                        (Some(w), Some(h)) => self.dims = Some((w as usize, h as usize)),
                        _ => return Err(EngineError::Corrupt("bad SPS".into())),
                    }
                }
                8 => self.has_pps = true,
                1 | 5 => {
                    if self.dims.is_none() || !self.has_pps {
                        return Err(EngineError::NoParameterSets);
                    }
                    let idx = decode_index(&nal[1..])
                        .ok_or_else(|| EngineError::Corrupt("truncated slice".into()))?;
                    if let Some((start, end)) = self.config.corrupt_slices {
                        if (start..end).contains(&idx) {
                            return Err(EngineError::Corrupt(format!("slice {}", idx)));
                        }
                    }
                    self.pending.push_back(idx);
                }
                _ => {}
            }
        }

        if self.pending.len() > self.config.latency {
            if let (Some(idx), Some((w, h))) = (self.pending.pop_front(), self.dims) {
                self.render(idx, w, h);
                return Ok(EngineStatus::Picture);
            }
        }
        Ok(EngineStatus::NoOutput)
    }

    fn picture(&self) -> Option<Picture<'_>> {
        let (w, h) = self.shown?;
        let pad = self.config.stride_padding;
        Some(Picture {
            y: &self.y,
            u: &self.u,
            v: &self.v,
            width: w as u32,
            height: h as u32,
            y_stride: w + pad,
            uv_stride: (w + 1) / 2 + pad / 2,
        })
    }

    fn flush(&mut self) {
        self.pending.clear();
        self.shown = None;
    }
}

pub fn fake_video_factory(config: FakeVideoConfig) -> VideoEngineFactory {
    Box::new(move |_options| {
        if config.fail_create {
            return Err(EngineError::Create("fake engine refused".into()));
        }
        Ok(Box::new(FakeVideoEngine::new(config)) as Box<dyn VideoEngine>)
    })
}

// ============================================================================
// Fake audio engine
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct FakeAudioConfig {
    pub fail_create: bool,
    pub reject_config: bool,
    /// Reject every optional parameter.
    pub reject_params: bool,
    /// Report "not enough bits" for the first payload.
    pub starve_first: bool,
    /// After this many frames, report a different sample rate.
    pub switch_to_rate_after: Option<(u64, u32)>,
}

/// Emits 1024 samples per channel, every sample equal to the payload index.
pub struct FakeAudioEngine {
    config: FakeAudioConfig,
    asc: Option<AudioSpecificConfig>,
    buffer: Vec<u8>,
    frames: u64,
    starved: bool,
    info: Option<AudioStreamInfo>,
}

impl FakeAudioEngine {
    pub fn new(config: FakeAudioConfig) -> Self {
        Self {
            config,
            asc: None,
            buffer: Vec::new(),
            frames: 0,
            starved: false,
            info: None,
        }
    }
}

impl AudioEngine for FakeAudioEngine {
    fn name(&self) -> &'static str {
        "fake-aac"
    }

    fn set_param(&mut self, param: AudioParam) -> Result<(), EngineError> {
        if self.config.reject_params {
            return Err(EngineError::Unsupported(format!("{:?}", param)));
        }
        Ok(())
    }

    fn configure(&mut self, config: &[u8]) -> Result<(), EngineError> {
        if self.config.reject_config {
            return Err(EngineError::Config("fake engine refused".into()));
        }
        let asc = AudioSpecificConfig::parse(config).map_err(|e| EngineError::Config(e.to_string()))?;
        self.asc = Some(asc);
        Ok(())
    }

    fn fill(&mut self, payload: &[u8]) -> Result<(), EngineError> {
        self.buffer.extend_from_slice(payload);
        Ok(())
    }

    fn decode_frame(&mut self, out: &mut Vec<i16>) -> Result<AudioStatus, EngineError> {
        let asc = self
            .asc
            .ok_or_else(|| EngineError::Config("not configured".into()))?;
        if self.buffer.is_empty() {
            return Ok(AudioStatus::NotEnoughBits);
        }
        if self.config.starve_first && !self.starved {
            self.starved = true;
            self.buffer.clear();
            return Ok(AudioStatus::NotEnoughBits);
        }
        let idx = audio_frame_index(&self.buffer);
        self.buffer.clear();
        let idx = idx.ok_or_else(|| EngineError::Corrupt("not a fake AAC frame".into()))?;

        let rate = match self.config.switch_to_rate_after {
            Some((after, rate)) if self.frames >= after => rate,
            _ => asc.sample_rate(),
        };
        let channels = asc.channels().max(1);
        out.clear();
        out.resize(AAC_FRAME_SAMPLES as usize * channels as usize, idx as i16);
        self.frames += 1;
        self.info = Some(AudioStreamInfo {
            sample_rate: rate,
            channels,
            frame_size: AAC_FRAME_SAMPLES as usize,
        });
        Ok(AudioStatus::Frame)
    }

    fn stream_info(&self) -> Option<AudioStreamInfo> {
        self.info
    }

    fn clear(&mut self) {
        self.buffer.clear();
    }
}

pub fn fake_audio_factory(config: FakeAudioConfig) -> AudioEngineFactory {
    Box::new(move || {
        if config.fail_create {
            return Err(EngineError::Create("fake engine refused".into()));
        }
        Ok(Box::new(FakeAudioEngine::new(config)) as Box<dyn AudioEngine>)
    })
}

#[test]
fn test_index_encoding_avoids_start_codes() {
    for idx in [0u32, 1, 127, 128, 300, 1 << 20] {
        let bytes = encode_index(idx);
        assert!(bytes.iter().all(|b| *b != 0));
        assert_eq!(decode_index(&bytes), Some(idx));
    }
}
