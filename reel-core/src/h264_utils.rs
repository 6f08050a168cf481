//! H.264 bitstream reassembly
//!
//! MP4 stores each video sample as a run of length-prefixed NAL units (AVCC).
//! The decoding engine wants start-code-delimited units (Annex B), so every
//! sample is rewritten before it reaches the video adapter.

use serde::Serialize;

/// Annex B start code (4-byte version)
pub const ANNEX_B_START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// Length prefix size used when the avcC record is absent or unusable.
pub const DEFAULT_NAL_LENGTH_SIZE: usize = 4;

/// Parameter sets carried in an `avcC` box.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AvcConfig {
    pub profile: u8,
    pub level: u8,
    pub nal_length_size: usize,
    #[serde(skip)]
    pub sps: Vec<Vec<u8>>,
    #[serde(skip)]
    pub pps: Vec<Vec<u8>>,
}

impl AvcConfig {
    /// Every parameter set as its own start-code-delimited unit, SPS first.
    pub fn annexb_units(&self) -> impl Iterator<Item = Vec<u8>> + '_ {
        self.sps.iter().chain(self.pps.iter()).map(|nal| with_start_code(nal))
    }

    pub fn is_complete(&self) -> bool {
        !self.sps.is_empty() && !self.pps.is_empty()
    }
}

/// Rewrite an AVCC sample into Annex B, appending to `out`.
///
/// AVCC: [length][NAL][length][NAL]...
/// Annex B: [00 00 00 01][NAL][00 00 00 01][NAL]...
///
/// A length running past the end of the sample stops the rewrite; whatever
/// was complete before it is kept. Zero-length units are skipped.
pub fn avcc_to_annexb_into(data: &[u8], nal_length_size: usize, out: &mut Vec<u8>) {
    let nal_length_size = match nal_length_size {
        1 | 2 | 4 => nal_length_size,
        _ => DEFAULT_NAL_LENGTH_SIZE,
    };
    out.reserve(data.len() + 64);

    let mut offset = 0;
    while offset + nal_length_size <= data.len() {
        let nal_len = read_be_uint(&data[offset..offset + nal_length_size]);
        offset += nal_length_size;

        if nal_len > data.len() - offset {
            tracing::trace!(
                "NAL length {} exceeds remaining {} bytes, truncating",
                nal_len,
                data.len() - offset
            );
            break;
        }
        if nal_len == 0 {
            continue;
        }

        out.extend_from_slice(&ANNEX_B_START_CODE);
        out.extend_from_slice(&data[offset..offset + nal_len]);
        offset += nal_len;
    }
}

pub fn avcc_to_annexb(data: &[u8], nal_length_size: usize) -> Vec<u8> {
    let mut out = Vec::new();
    avcc_to_annexb_into(data, nal_length_size, &mut out);
    out
}

/// Prefix a single NAL unit with a start code.
pub fn with_start_code(nal: &[u8]) -> Vec<u8> {
    let mut unit = Vec::with_capacity(nal.len() + ANNEX_B_START_CODE.len());
    unit.extend_from_slice(&ANNEX_B_START_CODE);
    unit.extend_from_slice(nal);
    unit
}

/// Decode an `avcC` record into its parameter sets.
pub fn parse_avcc(extradata: &[u8]) -> Option<AvcConfig> {
    // [0] version (1), [1] profile, [2] compat, [3] level,
    // [4] 0xFC | (length size - 1), [5] 0xE0 | sps count
    if extradata.len() < 7 || extradata[0] != 1 {
        return None;
    }

    let mut config = AvcConfig {
        profile: extradata[1],
        level: extradata[3],
        nal_length_size: ((extradata[4] & 0x03) + 1) as usize,
        ..Default::default()
    };
    if config.nal_length_size == 3 {
        return None;
    }

    let mut offset = 6;
    let num_sps = (extradata[5] & 0x1F) as usize;
    config.sps = read_parameter_sets(extradata, &mut offset, num_sps)?;

    if offset < extradata.len() {
        let num_pps = extradata[offset] as usize;
        offset += 1;
        config.pps = read_parameter_sets(extradata, &mut offset, num_pps)?;
    }

    Some(config)
}

fn read_parameter_sets(data: &[u8], offset: &mut usize, count: usize) -> Option<Vec<Vec<u8>>> {
    let mut sets = Vec::with_capacity(count);
    for _ in 0..count {
        if *offset + 2 > data.len() {
            return None;
        }
        let len = u16::from_be_bytes([data[*offset], data[*offset + 1]]) as usize;
        *offset += 2;
        if *offset + len > data.len() {
            return None;
        }
        sets.push(data[*offset..*offset + len].to_vec());
        *offset += len;
    }
    Some(sets)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NalKind {
    NonIdr,
    Idr,
    Sei,
    Sps,
    Pps,
    AccessUnitDelimiter,
    Other(u8),
}

impl NalKind {
    pub fn from_header(byte: u8) -> Self {
        match byte & 0x1F {
            1 => Self::NonIdr,
            5 => Self::Idr,
            6 => Self::Sei,
            7 => Self::Sps,
            8 => Self::Pps,
            9 => Self::AccessUnitDelimiter,
            n => Self::Other(n),
        }
    }
}

/// Type of the first NAL unit in an Annex B buffer.
pub fn first_nal_kind(annexb: &[u8]) -> Option<NalKind> {
    if annexb.len() > 4 && annexb[..4] == ANNEX_B_START_CODE {
        Some(NalKind::from_header(annexb[4]))
    } else {
        None
    }
}

/// Check if data already has Annex B start codes
pub fn is_annexb(data: &[u8]) -> bool {
    if data.len() < 4 {
        return false;
    }
    (data[0] == 0 && data[1] == 0 && data[2] == 0 && data[3] == 1)
        || (data[0] == 0 && data[1] == 0 && data[2] == 1)
}

/// Read big-endian unsigned integer of variable size (1-4 bytes)
fn read_be_uint(data: &[u8]) -> usize {
    data.iter().fold(0usize, |val, &b| (val << 8) | b as usize)
}
