//! # Buffer Pool
//!
//! Fixed-depth reuse pool for raw YUV scratch buffers. The video adapter
//! acquires one buffer per compacted frame and hands the old one back when
//! the frame size grows, so steady-state playback never touches the allocator.
//!
//! Buffers are handed out most-recently-released first. A release beyond the
//! pool depth frees the buffer instead of keeping it.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::{Error, Result};

pub const DEFAULT_POOL_DEPTH: usize = 3;

pub struct BufferPool {
    buffers: Mutex<Vec<Vec<u8>>>,
    depth: usize,
    allocations: AtomicU64,
    reuses: AtomicU64,
    released: AtomicU64,
    dropped: AtomicU64,
}

impl BufferPool {
    pub fn new(depth: usize) -> Self {
        Self {
            buffers: Mutex::new(Vec::with_capacity(depth)),
            depth,
            allocations: AtomicU64::new(0),
            reuses: AtomicU64::new(0),
            released: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Get a buffer of exactly `size` bytes, reusing a pooled one whose
    /// capacity is large enough.
    pub fn acquire(&self, size: usize) -> Result<Vec<u8>> {
        if size == 0 {
            return Err(Error::InvalidParam("buffer size must be non-zero".into()));
        }

        {
            let mut pool = self.buffers.lock();
            if let Some(idx) = pool.iter().rposition(|b| b.capacity() >= size) {
                let mut buf = pool.remove(idx);
                buf.resize(size, 0);
                self.reuses.fetch_add(1, Ordering::Relaxed);
                return Ok(buf);
            }
        }

        let mut buf = Vec::new();
        buf.try_reserve_exact(size)
            .map_err(|e| Error::OutOfMemory(format!("{} byte frame buffer: {}", size, e)))?;
        buf.resize(size, 0);
        self.allocations.fetch_add(1, Ordering::Relaxed);
        tracing::trace!("pool allocated {} bytes", size);
        Ok(buf)
    }

    /// Hand a buffer back. Kept only while the pool is below its depth.
    pub fn release(&self, buffer: Vec<u8>) {
        if buffer.capacity() == 0 {
            return;
        }
        self.released.fetch_add(1, Ordering::Relaxed);

        let mut pool = self.buffers.lock();
        if pool.len() < self.depth {
            pool.push(buffer);
        } else {
            drop(pool);
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn clear(&self) {
        self.buffers.lock().clear();
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            pooled: self.buffers.lock().len(),
            allocations: self.allocations.load(Ordering::Relaxed),
            reuses: self.reuses.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_DEPTH)
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("depth", &self.depth)
            .field("stats", &self.stats())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct PoolStats {
    pub pooled: usize,
    pub allocations: u64,
    pub reuses: u64,
    pub released: u64,
    pub dropped: u64,
}
