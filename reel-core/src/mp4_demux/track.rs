//! MP4 track metadata and `trak` parsing.

use serde::{Deserialize, Serialize};

use super::parser::{
    fourcc_str, read_descriptor_len, BoxCursor, ChildBoxes, AVC1, AVC3, AVCC, ESDS, HDLR, MDHD,
    MDIA, MINF, MP4A, SOUN, STBL, STSD, TKHD, VIDE,
};
use super::sample_table::{SampleEntry, SampleTable};
use crate::h264_utils::{parse_avcc, AvcConfig};
use crate::error::Result;

/// MPEG-4 object type indications that carry AAC.
const OTI_AAC: u8 = 0x40;
const OTI_AAC_MPEG2_MAIN: u8 = 0x66;
const OTI_AAC_MPEG2_LC: u8 = 0x67;
const OTI_AAC_MPEG2_SSR: u8 = 0x68;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackKind {
    Video,
    Audio,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Codec {
    H264,
    Aac,
    Unknown(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoParams {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioParams {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

/// Read-only description of one elementary stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub track_id: u32,
    pub kind: TrackKind,
    pub codec: Codec,
    pub timescale: u32,
    /// Duration in track ticks.
    pub duration_ticks: u64,
    /// Duration in seconds.
    pub duration: f64,
    pub sample_count: usize,
    pub video: Option<VideoParams>,
    pub audio: Option<AudioParams>,
}

impl Track {
    pub fn is_h264_video(&self) -> bool {
        self.kind == TrackKind::Video && self.codec == Codec::H264
    }

    pub fn is_aac_audio(&self) -> bool {
        self.kind == TrackKind::Audio && self.codec == Codec::Aac
    }

    pub fn width(&self) -> u32 {
        self.video.map(|v| v.width).unwrap_or(0)
    }

    pub fn height(&self) -> u32 {
        self.video.map(|v| v.height).unwrap_or(0)
    }

    pub fn sample_rate(&self) -> u32 {
        self.audio.map(|a| a.sample_rate).unwrap_or(0)
    }

    pub fn channels(&self) -> u16 {
        self.audio.map(|a| a.channels).unwrap_or(0)
    }
}

/// Out-of-band codec configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecConfig {
    Avc(AvcConfig),
    /// AudioSpecificConfig from the `esds` DecoderSpecificInfo.
    Aac(Vec<u8>),
}

/// A parsed `trak` with its resolved sample index.
#[derive(Debug, Clone)]
pub(crate) struct ParsedTrack {
    pub track: Track,
    pub samples: Vec<SampleEntry>,
    pub config: Option<CodecConfig>,
}

#[derive(Default)]
struct TrakBuilder {
    track_id: Option<u32>,
    handler: Option<[u8; 4]>,
    timescale: u32,
    duration: u64,
    entry_type: Option<[u8; 4]>,
    video: Option<VideoParams>,
    audio: Option<AudioParams>,
    avcc: Option<Vec<u8>>,
    esds: Option<EsDescriptor>,
    table: SampleTable,
}

#[derive(Debug, Default, Clone)]
struct EsDescriptor {
    object_type: u8,
    specific_info: Option<Vec<u8>>,
}

/// Parse one `trak` payload. Returns `None` for tracks that are neither
/// video nor audio.
pub(crate) fn parse_trak(trak: &[u8], fallback_id: u32) -> Result<Option<ParsedTrack>> {
    let mut b = TrakBuilder::default();
    for child in ChildBoxes::new(trak) {
        let (header, payload) = child?;
        match header.box_type {
            TKHD => parse_tkhd(&mut b, payload)?,
            MDIA => parse_mdia(&mut b, payload)?,
            _ => {}
        }
    }

    let kind = match b.handler {
        Some(VIDE) => TrackKind::Video,
        Some(SOUN) => TrackKind::Audio,
        other => {
            tracing::debug!(
                "skipping track with handler {:?}",
                other.map(|h| fourcc_str(&h))
            );
            return Ok(None);
        }
    };

    let codec = match (kind, b.entry_type) {
        (TrackKind::Video, Some(AVC1)) | (TrackKind::Video, Some(AVC3)) => Codec::H264,
        (TrackKind::Audio, Some(MP4A)) => match &b.esds {
            None => Codec::Aac,
            Some(es) => match es.object_type {
                OTI_AAC | OTI_AAC_MPEG2_MAIN | OTI_AAC_MPEG2_LC | OTI_AAC_MPEG2_SSR => Codec::Aac,
                oti => Codec::Unknown(format!("mp4a/0x{:02x}", oti)),
            },
        },
        (_, Some(code)) => Codec::Unknown(fourcc_str(&code)),
        (_, None) => Codec::Unknown("none".into()),
    };

    let config = match codec {
        Codec::H264 => b.avcc.as_deref().and_then(parse_avcc).map(CodecConfig::Avc),
        Codec::Aac => b
            .esds
            .as_ref()
            .and_then(|es| es.specific_info.clone())
            .map(CodecConfig::Aac),
        Codec::Unknown(_) => None,
    };

    let samples = b.table.build_index();

    // Some muxers leave mdhd duration at zero; fall back to the timing table.
    let duration_ticks = if b.duration == 0 {
        b.table.total_duration()
    } else {
        b.duration
    };
    let duration = if b.timescale > 0 {
        duration_ticks as f64 / b.timescale as f64
    } else {
        0.0
    };

    let track = Track {
        track_id: b.track_id.unwrap_or(fallback_id),
        kind,
        codec,
        timescale: b.timescale,
        duration_ticks,
        duration,
        sample_count: samples.len(),
        video: if kind == TrackKind::Video { b.video } else { None },
        audio: if kind == TrackKind::Audio { b.audio } else { None },
    };

    Ok(Some(ParsedTrack {
        track,
        samples,
        config,
    }))
}

fn parse_tkhd(b: &mut TrakBuilder, payload: &[u8]) -> Result<()> {
    let mut c = BoxCursor::new(payload, "tkhd");
    let (version, _flags) = c.full_box_header()?;
    if version == 1 {
        c.skip(16)?; // creation, modification
    } else {
        c.skip(8)?;
    }
    b.track_id = Some(c.u32()?);
    Ok(())
}

fn parse_mdia(b: &mut TrakBuilder, payload: &[u8]) -> Result<()> {
    // hdlr decides how stsd is read, so handle it before minf.
    for child in ChildBoxes::new(payload) {
        let (header, data) = child?;
        match header.box_type {
            MDHD => parse_mdhd(b, data)?,
            HDLR => parse_hdlr(b, data)?,
            _ => {}
        }
    }
    for child in ChildBoxes::new(payload) {
        let (header, data) = child?;
        if header.box_type == MINF {
            if let Some(stbl) = super::parser::find_child(data, STBL)? {
                parse_stbl(b, stbl)?;
            }
        }
    }
    Ok(())
}

fn parse_mdhd(b: &mut TrakBuilder, payload: &[u8]) -> Result<()> {
    let mut c = BoxCursor::new(payload, "mdhd");
    let (version, _flags) = c.full_box_header()?;
    if version == 1 {
        c.skip(16)?;
        b.timescale = c.u32()?;
        b.duration = c.u64_split()?;
    } else {
        c.skip(8)?;
        b.timescale = c.u32()?;
        let duration = c.u32()?;
        // All-ones marks an unknown duration.
        b.duration = if duration == u32::MAX { 0 } else { duration as u64 };
    }
    Ok(())
}

fn parse_hdlr(b: &mut TrakBuilder, payload: &[u8]) -> Result<()> {
    let mut c = BoxCursor::new(payload, "hdlr");
    c.full_box_header()?;
    c.skip(4)?; // pre_defined
    b.handler = Some(c.fourcc()?);
    Ok(())
}

fn parse_stbl(b: &mut TrakBuilder, payload: &[u8]) -> Result<()> {
    if let Some(stsd) = super::parser::find_child(payload, STSD)? {
        parse_stsd(b, stsd)?;
    }
    b.table = SampleTable::parse(payload)?;
    Ok(())
}

fn parse_stsd(b: &mut TrakBuilder, payload: &[u8]) -> Result<()> {
    let mut c = BoxCursor::new(payload, "stsd");
    c.full_box_header()?;
    let entry_count = c.u32()?;
    if entry_count == 0 {
        return Ok(());
    }

    // Only the first sample entry is used.
    let Some(first) = ChildBoxes::new(c.rest()).next() else {
        return Ok(());
    };
    let (header, entry) = first?;
    b.entry_type = Some(header.box_type);

    match b.handler {
        Some(VIDE) => parse_visual_entry(b, entry),
        Some(SOUN) => parse_audio_entry(b, entry),
        _ => Ok(()),
    }
}

fn parse_visual_entry(b: &mut TrakBuilder, entry: &[u8]) -> Result<()> {
    let mut c = BoxCursor::new(entry, "visual sample entry");
    c.skip(6)?; // reserved
    c.skip(2)?; // data_reference_index
    c.skip(16)?; // pre_defined, reserved
    let width = c.u16()? as u32;
    let height = c.u16()? as u32;
    c.skip(50)?; // resolution, frame count, compressor name, depth

    b.video = Some(VideoParams { width, height });

    for child in ChildBoxes::new(c.rest()) {
        let (header, data) = child?;
        if header.box_type == AVCC {
            b.avcc = Some(data.to_vec());
        }
    }
    Ok(())
}

fn parse_audio_entry(b: &mut TrakBuilder, entry: &[u8]) -> Result<()> {
    let mut c = BoxCursor::new(entry, "audio sample entry");
    c.skip(6)?; // reserved
    c.skip(2)?; // data_reference_index
    let version = c.u16()?;
    c.skip(6)?; // revision, vendor
    let channels = c.u16()?;
    let bits_per_sample = c.u16()?;
    c.skip(4)?; // compression id, packet size
    let sample_rate = c.u32()? >> 16;

    // QuickTime sound description extensions.
    match version {
        1 => c.skip(16)?,
        2 => c.skip(36)?,
        _ => {}
    }

    b.audio = Some(AudioParams {
        sample_rate,
        channels,
        bits_per_sample,
    });

    for child in ChildBoxes::new(c.rest()) {
        let (header, data) = child?;
        if header.box_type == ESDS {
            b.esds = Some(parse_esds(data)?);
        }
    }
    Ok(())
}

fn parse_esds(payload: &[u8]) -> Result<EsDescriptor> {
    const ES_DESCR_TAG: u8 = 0x03;
    const DECODER_CONFIG_TAG: u8 = 0x04;
    const DEC_SPECIFIC_TAG: u8 = 0x05;

    let mut es = EsDescriptor::default();
    let mut c = BoxCursor::new(payload, "esds");
    c.full_box_header()?;

    if c.u8()? != ES_DESCR_TAG {
        return Ok(es);
    }
    read_descriptor_len(&mut c)?;
    c.skip(2)?; // ES_ID
    let flags = c.u8()?;
    if flags & 0x80 != 0 {
        c.skip(2)?; // dependsOn_ES_ID
    }
    if flags & 0x40 != 0 {
        let url_len = c.u8()? as usize;
        c.skip(url_len)?;
    }
    if flags & 0x20 != 0 {
        c.skip(2)?; // OCR_ES_ID
    }

    if c.u8()? != DECODER_CONFIG_TAG {
        return Ok(es);
    }
    read_descriptor_len(&mut c)?;
    es.object_type = c.u8()?;
    c.skip(12)?; // stream type, buffer size, max/avg bitrate

    if c.remaining() > 0 && c.u8()? == DEC_SPECIFIC_TAG {
        let len = read_descriptor_len(&mut c)?;
        es.specific_info = Some(c.take(len)?.to_vec());
    }
    Ok(es)
}
