//! AAC AudioSpecificConfig synthesis.
//!
//! The session does not trust the container's `esds` blob; it builds the
//! two-byte low-complexity config from the track's rate and channel count.

use crate::error::{Error, Result};

/// Sampling frequency table, indexed by the 4-bit frequency index.
pub const SAMPLE_RATES: [u32; 12] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000,
];

/// AAC Low Complexity audio object type.
pub const AOT_AAC_LC: u8 = 2;

/// Index used when the rate is not in the table (44100 Hz).
pub const DEFAULT_RATE_INDEX: u8 = 4;

/// Largest value that fits the 4-bit channel configuration field as used here.
pub const MAX_CHANNEL_CONFIG: u8 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSpecificConfig {
    pub object_type: u8,
    pub rate_index: u8,
    pub channel_config: u8,
}

pub fn rate_index(sample_rate: u32) -> u8 {
    SAMPLE_RATES
        .iter()
        .position(|&r| r == sample_rate)
        .map(|i| i as u8)
        .unwrap_or(DEFAULT_RATE_INDEX)
}

impl AudioSpecificConfig {
    pub fn synthesize(sample_rate: u32, channels: u16) -> Self {
        Self {
            object_type: AOT_AAC_LC,
            rate_index: rate_index(sample_rate),
            channel_config: channels.min(MAX_CHANNEL_CONFIG as u16) as u8,
        }
    }

    /// 5 bits object type, 4 bits frequency index, 4 bits channel config,
    /// 3 bits zero.
    pub fn to_bytes(&self) -> [u8; 2] {
        let asc: u16 = ((self.object_type as u16 & 0x1F) << 11)
            | ((self.rate_index as u16 & 0x0F) << 7)
            | ((self.channel_config as u16 & 0x0F) << 3);
        asc.to_be_bytes()
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 2 {
            return Err(Error::InvalidParam(format!(
                "AudioSpecificConfig needs 2 bytes, got {}",
                bytes.len()
            )));
        }
        let word = u16::from_be_bytes([bytes[0], bytes[1]]);
        let config = Self {
            object_type: (word >> 11) as u8,
            rate_index: ((word >> 7) & 0x0F) as u8,
            channel_config: ((word >> 3) & 0x0F) as u8,
        };
        if config.object_type == 0 || config.object_type == 31 {
            return Err(Error::UnsupportedFormat(format!(
                "audio object type {}",
                config.object_type
            )));
        }
        if config.rate_index as usize >= SAMPLE_RATES.len() {
            return Err(Error::UnsupportedFormat(format!(
                "sampling frequency index {}",
                config.rate_index
            )));
        }
        Ok(config)
    }

    pub fn sample_rate(&self) -> u32 {
        SAMPLE_RATES
            .get(self.rate_index as usize)
            .copied()
            .unwrap_or(SAMPLE_RATES[DEFAULT_RATE_INDEX as usize])
    }

    /// Output channel count implied by the channel configuration.
    pub fn channels(&self) -> u16 {
        match self.channel_config {
            7 => 8,
            n => n as u16,
        }
    }
}
