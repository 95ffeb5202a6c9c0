//! Linear Allocator
//!
//! Bump allocator over a fixed buffer. Supplies every transient buffer a
//! statement needs (serialized values, leaf splice buffers, read-out
//! buffers) and reclaims memory only by resetting to a checkpoint.
//!
//! ## Layout
//! ```text
//! ┌──────────────────────────┬─────────────────────────────┐
//! │ allocated (0..used)      │ free (used..limit)          │
//! └──────────────────────────┴─────────────────────────────┘
//! ```
//!
//! Allocations are handed out as [`ArenaSlice`] handles (offset + length)
//! rather than references, so the arena can be borrowed again while a
//! handle is alive. Resetting past a handle's offset invalidates it; that
//! is a caller bug and is not checked at runtime.

use crate::error::{NumstoreError, Result};

/// Handle to a region of the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaSlice {
    offset: usize,
    len: usize,
}

impl ArenaSlice {
    /// Start of the region within the arena
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Length of the region in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Saved allocation mark
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Checkpoint(usize);

/// Bump allocator over a fixed buffer
pub struct LinearAllocator {
    data: Box<[u8]>,
    used: usize,
    limit: usize,
}

impl LinearAllocator {
    /// Create an allocator owning a zeroed buffer of `limit` bytes
    pub fn new(limit: usize) -> Self {
        Self {
            data: vec![0u8; limit].into_boxed_slice(),
            used: 0,
            limit,
        }
    }

    /// Create an allocator over a caller-provided buffer.
    ///
    /// `limit` is clamped to the buffer length.
    pub fn from_buffer(buffer: Box<[u8]>, limit: usize) -> Self {
        let limit = limit.min(buffer.len());
        Self {
            data: buffer,
            used: 0,
            limit,
        }
    }

    /// Reserve `count * element_size` bytes.
    ///
    /// Fails with `OutOfMemory` without touching `used` when the request
    /// overflows or does not fit in the remaining space.
    pub fn allocate(&mut self, count: usize, element_size: usize) -> Result<ArenaSlice> {
        let size = count.checked_mul(element_size).ok_or_else(|| {
            NumstoreError::OutOfMemory(format!(
                "arena request {} x {} overflows",
                count, element_size
            ))
        })?;

        if size > self.remaining() {
            return Err(NumstoreError::OutOfMemory(format!(
                "arena exhausted: requested {} bytes, {} of {} remaining",
                size,
                self.remaining(),
                self.limit
            )));
        }

        let slice = ArenaSlice {
            offset: self.used,
            len: size,
        };
        self.used += size;
        Ok(slice)
    }

    /// Allocate a region and copy `src` into it
    pub fn alloc_copy(&mut self, src: &[u8]) -> Result<ArenaSlice> {
        let slice = self.allocate(src.len(), 1)?;
        self.bytes_mut(slice).copy_from_slice(src);
        Ok(slice)
    }

    /// Borrow an allocated region
    pub fn bytes(&self, slice: ArenaSlice) -> &[u8] {
        &self.data[slice.offset..slice.offset + slice.len]
    }

    /// Mutably borrow an allocated region
    pub fn bytes_mut(&mut self, slice: ArenaSlice) -> &mut [u8] {
        &mut self.data[slice.offset..slice.offset + slice.len]
    }

    /// Current allocation mark
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.used)
    }

    /// Roll back to a previous mark, invalidating everything allocated since
    pub fn reset_to(&mut self, checkpoint: Checkpoint) {
        debug_assert!(checkpoint.0 <= self.used, "checkpoint is ahead of the arena");
        self.used = checkpoint.0.min(self.used);
    }

    /// Release every allocation
    pub fn reset(&mut self) {
        self.reset_to(Checkpoint(0));
    }

    /// Bytes handed out so far
    pub fn used(&self) -> usize {
        self.used
    }

    /// Bytes still available
    pub fn remaining(&self) -> usize {
        self.limit - self.used
    }

    /// Total capacity
    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl std::fmt::Debug for LinearAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearAllocator")
            .field("used", &self.used)
            .field("limit", &self.limit)
            .finish()
    }
}
