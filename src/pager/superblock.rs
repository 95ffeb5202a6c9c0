//! Superblock
//!
//! File-level metadata stored at the start of page 0.
//!
//! ## Layout (little-endian, 64 bytes)
//! ```text
//! ┌───────────┬─────────┬──────────┬───────────┬────────────┐
//! │ Magic (8) │ Ver (2) │ Rsvd (2) │ PgSize(4) │ PgCount(4) │
//! ├───────────┴─┬───────┴──────────┼───────────┴─┬──────────┤
//! │ FreeHead(4) │ FreeCount (4)    │ RootHash(4) │ CRC (4)  │
//! └─────────────┴──────────────────┴─────────────┴──────────┘
//! ```

use bytes::{Buf, BufMut};

use super::{Pgno, NIL};
use crate::error::{NumstoreError, Result};

/// Magic bytes identifying a numstore file
pub const MAGIC: &[u8; 8] = b"NUMSTORE";

/// Current on-disk format version
pub const FORMAT_VERSION: u16 = 1;

/// Bytes reserved for the superblock at the start of page 0
pub const SUPERBLOCK_SIZE: usize = 64;

/// Bytes covered by the superblock checksum
const CHECKSUMMED_LEN: usize = 32;

/// File-level metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
    /// Page size in bytes, fixed at creation
    pub page_size: u32,
    /// Pages in the file, superblock page included
    pub page_count: u32,
    /// First page of the free list (NIL = empty)
    pub free_head: Pgno,
    /// Pages currently on the free list
    pub free_count: u32,
    /// Head of the variable hash directory
    pub root_hash: Pgno,
}

impl Superblock {
    /// Superblock for a freshly created file
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size,
            page_count: 1,
            free_head: NIL,
            free_count: 0,
            root_hash: NIL,
        }
    }

    /// Encode into a `SUPERBLOCK_SIZE` buffer
    pub fn encode(&self) -> [u8; SUPERBLOCK_SIZE] {
        let mut buf = [0u8; SUPERBLOCK_SIZE];
        {
            let mut out = &mut buf[..];
            out.put_slice(MAGIC);
            out.put_u16_le(FORMAT_VERSION);
            out.put_u16_le(0);
            out.put_u32_le(self.page_size);
            out.put_u32_le(self.page_count);
            out.put_u32_le(self.free_head);
            out.put_u32_le(self.free_count);
            out.put_u32_le(self.root_hash);
        }
        let crc = crc32fast::hash(&buf[..CHECKSUMMED_LEN]);
        buf[CHECKSUMMED_LEN..CHECKSUMMED_LEN + 4].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Decode and validate a superblock
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < SUPERBLOCK_SIZE {
            return Err(NumstoreError::corrupt(0, "truncated superblock"));
        }

        if &buf[0..8] != MAGIC {
            return Err(NumstoreError::corrupt(
                0,
                format!("invalid magic: expected NUMSTORE, got {:?}", &buf[0..8]),
            ));
        }

        let stored_crc = (&buf[CHECKSUMMED_LEN..CHECKSUMMED_LEN + 4]).get_u32_le();
        if stored_crc != crc32fast::hash(&buf[..CHECKSUMMED_LEN]) {
            return Err(NumstoreError::corrupt(0, "superblock checksum mismatch"));
        }

        let mut src = &buf[8..CHECKSUMMED_LEN];
        let version = src.get_u16_le();
        if version != FORMAT_VERSION {
            return Err(NumstoreError::corrupt(
                0,
                format!("unsupported format version: {}", version),
            ));
        }
        let _reserved = src.get_u16_le();

        Ok(Self {
            page_size: src.get_u32_le(),
            page_count: src.get_u32_le(),
            free_head: src.get_u32_le(),
            free_count: src.get_u32_le(),
            root_hash: src.get_u32_le(),
        })
    }
}
