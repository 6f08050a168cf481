//! MP4 sample tables (`stbl`) and their flattening into a per-sample index.

use super::parser::{
    BoxCursor, ChildBoxes, CO64, CTTS, STCO, STSC, STSS, STSZ, STTS,
};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default)]
pub struct SampleTable {
    pub sample_sizes: Vec<u32>,
    pub fixed_sample_size: u32,
    pub sample_count: u32,
    pub chunk_offsets: Vec<u64>,
    pub sample_to_chunk: Vec<(u32, u32, u32)>, // first_chunk, samples_per_chunk, sample_desc_index
    pub time_to_sample: Vec<(u32, u32)>,       // sample_count, sample_delta
    pub keyframes: Option<Vec<u32>>,           // 1-based sample numbers; None = all sync
    pub composition_offsets: Vec<(u32, i32)>,  // sample_count, offset
}

/// One sample's location and timing, resolved once at open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleEntry {
    pub offset: u64,
    pub size: u32,
    pub dts: u64,
    pub duration: u32,
    pub composition_offset: i32,
    pub is_keyframe: bool,
}

impl SampleTable {
    /// Parse the table boxes found in an `stbl` payload. `stsd` is handled
    /// by the track parser.
    pub fn parse(stbl: &[u8]) -> Result<Self> {
        let mut table = SampleTable::default();
        for child in ChildBoxes::new(stbl) {
            let (header, payload) = child?;
            match header.box_type {
                STTS => table.parse_stts(payload)?,
                CTTS => table.parse_ctts(payload)?,
                STSC => table.parse_stsc(payload)?,
                STSZ => table.parse_stsz(payload)?,
                STCO => table.parse_stco(payload)?,
                CO64 => table.parse_co64(payload)?,
                STSS => table.parse_stss(payload)?,
                _ => {}
            }
        }
        Ok(table)
    }

    fn parse_stts(&mut self, payload: &[u8]) -> Result<()> {
        let mut c = BoxCursor::new(payload, "stts");
        c.full_box_header()?;
        let count = c.entry_count(8)?;
        self.time_to_sample.reserve(count);
        for _ in 0..count {
            let sample_count = c.u32()?;
            let sample_delta = c.u32()?;
            self.time_to_sample.push((sample_count, sample_delta));
        }
        Ok(())
    }

    fn parse_ctts(&mut self, payload: &[u8]) -> Result<()> {
        let mut c = BoxCursor::new(payload, "ctts");
        c.full_box_header()?;
        let count = c.entry_count(8)?;
        self.composition_offsets.reserve(count);
        for _ in 0..count {
            let sample_count = c.u32()?;
            // Version 0 offsets are unsigned in the standard but negative
            // values are written in practice; read both as signed.
            let offset = c.i32()?;
            self.composition_offsets.push((sample_count, offset));
        }
        Ok(())
    }

    fn parse_stsc(&mut self, payload: &[u8]) -> Result<()> {
        let mut c = BoxCursor::new(payload, "stsc");
        c.full_box_header()?;
        let count = c.entry_count(12)?;
        self.sample_to_chunk.reserve(count);
        for _ in 0..count {
            let first_chunk = c.u32()?;
            let samples_per_chunk = c.u32()?;
            let desc_index = c.u32()?;
            if first_chunk == 0 {
                return Err(Error::UnsupportedFormat("stsc first_chunk is zero".into()));
            }
            self.sample_to_chunk.push((first_chunk, samples_per_chunk, desc_index));
        }
        Ok(())
    }

    fn parse_stsz(&mut self, payload: &[u8]) -> Result<()> {
        let mut c = BoxCursor::new(payload, "stsz");
        c.full_box_header()?;
        self.fixed_sample_size = c.u32()?;
        if self.fixed_sample_size == 0 {
            let count = c.entry_count(4)?;
            self.sample_count = count as u32;
            self.sample_sizes.reserve(count);
            for _ in 0..count {
                self.sample_sizes.push(c.u32()?);
            }
        } else {
            self.sample_count = c.u32()?;
        }
        Ok(())
    }

    fn parse_stco(&mut self, payload: &[u8]) -> Result<()> {
        let mut c = BoxCursor::new(payload, "stco");
        c.full_box_header()?;
        let count = c.entry_count(4)?;
        self.chunk_offsets.reserve(count);
        for _ in 0..count {
            self.chunk_offsets.push(c.u32()? as u64);
        }
        Ok(())
    }

    fn parse_co64(&mut self, payload: &[u8]) -> Result<()> {
        let mut c = BoxCursor::new(payload, "co64");
        c.full_box_header()?;
        let count = c.entry_count(8)?;
        self.chunk_offsets.reserve(count);
        for _ in 0..count {
            self.chunk_offsets.push(c.u64()?);
        }
        Ok(())
    }

    fn parse_stss(&mut self, payload: &[u8]) -> Result<()> {
        let mut c = BoxCursor::new(payload, "stss");
        c.full_box_header()?;
        let count = c.entry_count(4)?;
        let mut keyframes = Vec::with_capacity(count);
        for _ in 0..count {
            keyframes.push(c.u32()?);
        }
        keyframes.sort_unstable();
        self.keyframes = Some(keyframes);
        Ok(())
    }

    fn sample_size(&self, index: usize) -> Option<u32> {
        if self.fixed_sample_size != 0 {
            Some(self.fixed_sample_size)
        } else {
            self.sample_sizes.get(index).copied()
        }
    }

    /// Sum of all `stts` deltas, in track ticks.
    pub fn total_duration(&self) -> u64 {
        self.time_to_sample
            .iter()
            .map(|&(count, delta)| count as u64 * delta as u64)
            .sum()
    }

    /// Resolve every sample's file offset, size and timing.
    ///
    /// Samples the chunk map does not place are left out, so a truncated
    /// `stco` shortens the track instead of failing the whole file.
    pub fn build_index(&self) -> Vec<SampleEntry> {
        let total = self.sample_count as usize;
        let mut entries = Vec::with_capacity(total.min(1 << 20));

        // Chunk map: offsets and sizes.
        let mut sample = 0usize;
        'chunks: for (i, &(first_chunk, per_chunk, _)) in self.sample_to_chunk.iter().enumerate() {
            let start = (first_chunk - 1) as usize;
            let end = match self.sample_to_chunk.get(i + 1) {
                Some(&(next_first, _, _)) => ((next_first - 1) as usize).min(self.chunk_offsets.len()),
                None => self.chunk_offsets.len(),
            };
            for chunk in start..end {
                let mut offset = self.chunk_offsets[chunk];
                for _ in 0..per_chunk {
                    if sample >= total {
                        break 'chunks;
                    }
                    let Some(size) = self.sample_size(sample) else {
                        break 'chunks;
                    };
                    let Some(next) = offset.checked_add(size as u64) else {
                        break 'chunks;
                    };
                    entries.push(SampleEntry {
                        offset,
                        size,
                        dts: 0,
                        duration: 0,
                        composition_offset: 0,
                        is_keyframe: true,
                    });
                    offset = next;
                    sample += 1;
                }
            }
        }

        // Decode timestamps. Samples beyond the stts coverage reuse the last delta.
        let mut dts = 0u64;
        let mut last_delta = 0u32;
        let mut deltas = self
            .time_to_sample
            .iter()
            .flat_map(|&(count, delta)| std::iter::repeat(delta).take(count as usize));
        for entry in entries.iter_mut() {
            let delta = deltas.next().unwrap_or(last_delta);
            last_delta = delta;
            entry.dts = dts;
            entry.duration = delta;
            dts += delta as u64;
        }

        let mut offsets = self
            .composition_offsets
            .iter()
            .flat_map(|&(count, off)| std::iter::repeat(off).take(count as usize));
        for entry in entries.iter_mut() {
            match offsets.next() {
                Some(off) => entry.composition_offset = off,
                None => break,
            }
        }

        if let Some(keyframes) = &self.keyframes {
            for entry in entries.iter_mut() {
                entry.is_keyframe = false;
            }
            for &number in keyframes {
                if let Some(entry) = (number as usize).checked_sub(1).and_then(|i| entries.get_mut(i)) {
                    entry.is_keyframe = true;
                }
            }
        }

        entries
    }
}
