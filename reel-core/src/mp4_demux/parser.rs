//! MP4 box parsing helpers.

use bytes::Buf;

use crate::error::{Error, Result};

pub const FTYP: [u8; 4] = *b"ftyp";
pub const MOOV: [u8; 4] = *b"moov";
pub const MDAT: [u8; 4] = *b"mdat";
pub const MVHD: [u8; 4] = *b"mvhd";
pub const TRAK: [u8; 4] = *b"trak";
pub const TKHD: [u8; 4] = *b"tkhd";
pub const MDIA: [u8; 4] = *b"mdia";
pub const MDHD: [u8; 4] = *b"mdhd";
pub const HDLR: [u8; 4] = *b"hdlr";
pub const MINF: [u8; 4] = *b"minf";
pub const STBL: [u8; 4] = *b"stbl";
pub const STSD: [u8; 4] = *b"stsd";
pub const STTS: [u8; 4] = *b"stts";
pub const CTTS: [u8; 4] = *b"ctts";
pub const STSC: [u8; 4] = *b"stsc";
pub const STSZ: [u8; 4] = *b"stsz";
pub const STCO: [u8; 4] = *b"stco";
pub const CO64: [u8; 4] = *b"co64";
pub const STSS: [u8; 4] = *b"stss";
pub const AVC1: [u8; 4] = *b"avc1";
pub const AVC3: [u8; 4] = *b"avc3";
pub const AVCC: [u8; 4] = *b"avcC";
pub const MP4A: [u8; 4] = *b"mp4a";
pub const ESDS: [u8; 4] = *b"esds";
pub const VIDE: [u8; 4] = *b"vide";
pub const SOUN: [u8; 4] = *b"soun";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxHeader {
    /// Total box size including the header. 0 means "to end of enclosing data".
    pub size: u64,
    pub box_type: [u8; 4],
    pub header_size: u64,
}

impl BoxHeader {
    pub fn payload_size(&self) -> Option<u64> {
        if self.size == 0 {
            None
        } else {
            Some(self.size - self.header_size)
        }
    }
}

pub fn fourcc_str(code: &[u8; 4]) -> String {
    code.iter()
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '?' })
        .collect()
}

/// Parse a box header from the start of `data` (at least 8 bytes, 16 for
/// extended sizes).
pub fn read_box_header(data: &[u8]) -> Result<BoxHeader> {
    let mut cursor = data;
    if cursor.remaining() < 8 {
        return Err(Error::UnsupportedFormat("truncated box header".into()));
    }
    let size = cursor.get_u32() as u64;
    let mut box_type = [0u8; 4];
    cursor.copy_to_slice(&mut box_type);

    let (size, header_size) = if size == 1 {
        if cursor.remaining() < 8 {
            return Err(Error::UnsupportedFormat("truncated extended box header".into()));
        }
        let ext_size = cursor.get_u64();
        if ext_size < 16 {
            return Err(Error::UnsupportedFormat("invalid extended box size".into()));
        }
        (ext_size, 16)
    } else if size == 0 {
        (0, 8)
    } else {
        if size < 8 {
            return Err(Error::UnsupportedFormat(format!(
                "invalid box size {} for '{}'",
                size,
                fourcc_str(&box_type)
            )));
        }
        (size, 8)
    };

    Ok(BoxHeader {
        size,
        box_type,
        header_size,
    })
}

/// Bounds-checked big-endian reader over an in-memory box payload.
#[derive(Clone, Copy)]
pub struct BoxCursor<'a> {
    buf: &'a [u8],
    what: &'static str,
}

impl<'a> BoxCursor<'a> {
    pub fn new(buf: &'a [u8], what: &'static str) -> Self {
        Self { buf, what }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn need(&self, n: usize) -> Result<()> {
        if self.buf.remaining() < n {
            Err(Error::UnsupportedFormat(format!(
                "truncated '{}' box: need {} bytes, have {}",
                self.what,
                n,
                self.buf.remaining()
            )))
        } else {
            Ok(())
        }
    }

    pub fn u8(&mut self) -> Result<u8> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn u16(&mut self) -> Result<u16> {
        self.need(2)?;
        Ok(self.buf.get_u16())
    }

    pub fn u32(&mut self) -> Result<u32> {
        self.need(4)?;
        Ok(self.buf.get_u32())
    }

    pub fn i32(&mut self) -> Result<i32> {
        self.need(4)?;
        Ok(self.buf.get_i32())
    }

    pub fn u64(&mut self) -> Result<u64> {
        self.need(8)?;
        Ok(self.buf.get_u64())
    }

    /// 64-bit value stored as two 32-bit halves, high half first.
    pub fn u64_split(&mut self) -> Result<u64> {
        let hi = self.u32()? as u64;
        let lo = self.u32()? as u64;
        Ok((hi << 32) | lo)
    }

    pub fn fourcc(&mut self) -> Result<[u8; 4]> {
        self.need(4)?;
        let mut code = [0u8; 4];
        self.buf.copy_to_slice(&mut code);
        Ok(code)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.need(n)?;
        self.buf.advance(n);
        Ok(())
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        self.need(n)?;
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    pub fn rest(&mut self) -> &'a [u8] {
        let rest = self.buf;
        self.buf = &[];
        rest
    }

    /// Version byte and 24-bit flags of a full box.
    pub fn full_box_header(&mut self) -> Result<(u8, u32)> {
        let word = self.u32()?;
        Ok(((word >> 24) as u8, word & 0x00FF_FFFF))
    }

    /// Entry count of a table box, checked against the bytes left so a
    /// corrupt count cannot drive a huge allocation.
    pub fn entry_count(&mut self, entry_size: usize) -> Result<usize> {
        let count = self.u32()? as usize;
        if count.saturating_mul(entry_size) > self.remaining() {
            return Err(Error::UnsupportedFormat(format!(
                "'{}' declares {} entries but only {} bytes remain",
                self.what,
                count,
                self.remaining()
            )));
        }
        Ok(count)
    }
}

/// Iterates the child boxes of an in-memory container payload.
pub struct ChildBoxes<'a> {
    data: &'a [u8],
}

impl<'a> ChildBoxes<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl<'a> Iterator for ChildBoxes<'a> {
    type Item = Result<(BoxHeader, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.len() < 8 {
            return None;
        }
        let header = match read_box_header(self.data) {
            Ok(h) => h,
            Err(e) => {
                self.data = &[];
                return Some(Err(e));
            }
        };
        let total = if header.size == 0 {
            self.data.len()
        } else {
            match usize::try_from(header.size) {
                Ok(s) if s <= self.data.len() => s,
                _ => {
                    let err = Error::UnsupportedFormat(format!(
                        "box '{}' overruns its parent ({} > {})",
                        fourcc_str(&header.box_type),
                        header.size,
                        self.data.len()
                    ));
                    self.data = &[];
                    return Some(Err(err));
                }
            }
        };
        let payload = &self.data[header.header_size as usize..total];
        self.data = &self.data[total..];
        Some(Ok((header, payload)))
    }
}

/// Find the first child box of the given type.
pub fn find_child<'a>(data: &'a [u8], box_type: [u8; 4]) -> Result<Option<&'a [u8]>> {
    for child in ChildBoxes::new(data) {
        let (header, payload) = child?;
        if header.box_type == box_type {
            return Ok(Some(payload));
        }
    }
    Ok(None)
}

/// Expandable MPEG-4 descriptor length (1 to 4 bytes, 7 bits each).
pub fn read_descriptor_len(cursor: &mut BoxCursor<'_>) -> Result<usize> {
    let mut len = 0usize;
    for _ in 0..4 {
        let b = cursor.u8()?;
        len = (len << 7) | (b & 0x7F) as usize;
        if b & 0x80 == 0 {
            break;
        }
    }
    Ok(len)
}
