//! Random-access byte sources for the container demuxer.
//!
//! The demuxer never assumes the whole file is in memory: it asks for
//! `(offset, len)` ranges and works with however many bytes come back.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

pub trait ByteSource: Send {
    /// Read up to `buf.len()` bytes at `offset`. Returns the number of bytes
    /// actually available, which is short only at end of data.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Total length of the underlying data in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fill `buf` completely or fail with `UnexpectedEof`.
pub fn read_exact_at<S: ByteSource + ?Sized>(
    source: &mut S,
    offset: u64,
    buf: &mut [u8],
) -> io::Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = source.read_at(offset + filled as u64, &mut buf[filled..])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("short read at offset {}", offset + filled as u64),
            ));
        }
        filled += n;
    }
    Ok(())
}

pub struct FileSource {
    file: File,
    len: u64,
}

impl FileSource {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }
}

impl ByteSource for FileSource {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if offset >= self.len {
            return Ok(0);
        }
        self.file.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    fn len(&self) -> u64 {
        self.len
    }
}

/// In-memory container bytes.
pub struct MemorySource<T> {
    data: T,
}

impl<T: AsRef<[u8]>> MemorySource<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

impl<T: AsRef<[u8]> + Send> ByteSource for MemorySource<T> {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let data = self.data.as_ref();
        let start = match usize::try_from(offset) {
            Ok(s) if s < data.len() => s,
            _ => return Ok(0),
        };
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }

    fn len(&self) -> u64 {
        self.data.as_ref().len() as u64
    }
}

/// Adapts any seekable reader.
pub struct ReaderSource<R> {
    reader: R,
    len: u64,
}

impl<R: Read + Seek> ReaderSource<R> {
    pub fn new(mut reader: R) -> io::Result<Self> {
        let len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        Ok(Self { reader, len })
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read + Seek + Send> ByteSource for ReaderSource<R> {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if offset >= self.len {
            return Ok(0);
        }
        self.reader.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    fn len(&self) -> u64 {
        self.len
    }
}
