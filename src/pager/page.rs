//! Page views
//!
//! Every page except page 0 starts with the same 8-byte header:
//!
//! ```text
//! ┌──────────────┬─────────┬───────────┬──────────────┐
//! │ Checksum (4) │ Tag (1) │ Flags (1) │ Reserved (2) │
//! └──────────────┴─────────┴───────────┴──────────────┘
//! ```
//!
//! The checksum is CRC32 over bytes `4..page_size` and is refreshed by
//! [`Page::encode`]. A tag of zero marks a zeroed, untyped page.

use bytes::{Buf, BufMut};

use super::hash_page::HashPage;
use super::inner_node::InnerNode;
use super::var_page::VarPage;
use super::{PageLayout, Pgno};
use crate::error::{NumstoreError, Result};

/// Size of the common page header
pub const COMMON_HEADER_SIZE: usize = 8;

/// Leaf header: common + used (4)
pub const LEAF_HEADER_SIZE: usize = COMMON_HEADER_SIZE + 4;

/// Free page header: common + next (4)
pub const FREE_HEADER_SIZE: usize = COMMON_HEADER_SIZE + 4;

const TAG_OFFSET: usize = 4;
const FLAGS_OFFSET: usize = 5;

/// Raw page bytes
pub type PageBuf = Vec<u8>;

/// Page type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PageKind {
    Free = 1,
    Hash = 2,
    Var = 3,
    Inner = 4,
    Leaf = 5,
}

impl PageKind {
    /// Parse a tag byte
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(PageKind::Free),
            2 => Some(PageKind::Hash),
            3 => Some(PageKind::Var),
            4 => Some(PageKind::Inner),
            5 => Some(PageKind::Leaf),
            _ => None,
        }
    }
}

/// A decoded page
#[derive(Debug, Clone, PartialEq)]
pub enum Page {
    Free(FreePage),
    Hash(HashPage),
    Var(VarPage),
    Inner(InnerNode),
    Leaf(LeafPage),
}

impl Page {
    /// Type tag of this page
    pub fn kind(&self) -> PageKind {
        match self {
            Page::Free(_) => PageKind::Free,
            Page::Hash(_) => PageKind::Hash,
            Page::Var(_) => PageKind::Var,
            Page::Inner(_) => PageKind::Inner,
            Page::Leaf(_) => PageKind::Leaf,
        }
    }

    /// Decode raw page bytes, optionally verifying the checksum
    pub fn decode(pgno: Pgno, buf: &[u8], layout: &PageLayout, verify: bool) -> Result<Self> {
        if buf.len() != layout.page_size() {
            return Err(NumstoreError::corrupt(
                pgno,
                format!("page is {} bytes, expected {}", buf.len(), layout.page_size()),
            ));
        }

        let kind = match PageKind::from_tag(buf[TAG_OFFSET]) {
            Some(kind) => kind,
            None => {
                return Err(NumstoreError::corrupt(
                    pgno,
                    format!("invalid page tag 0x{:02x}", buf[TAG_OFFSET]),
                ))
            }
        };

        if verify && stored_checksum(buf) != compute_checksum(buf) {
            return Err(NumstoreError::corrupt(pgno, "checksum mismatch"));
        }

        let flags = buf[FLAGS_OFFSET];
        let page = match kind {
            PageKind::Free => Page::Free(FreePage::decode(buf)),
            PageKind::Hash => Page::Hash(HashPage::decode(pgno, buf, layout)?),
            PageKind::Var => Page::Var(VarPage::decode(pgno, buf)?),
            PageKind::Inner => Page::Inner(InnerNode::decode(pgno, buf, flags, layout)?),
            PageKind::Leaf => Page::Leaf(LeafPage::decode(pgno, buf, layout)?),
        };
        Ok(page)
    }

    /// Encode into a sealed page buffer
    pub fn encode(&self, pgno: Pgno, layout: &PageLayout) -> Result<PageBuf> {
        let mut buf = vec![0u8; layout.page_size()];
        let flags = match self {
            Page::Free(p) => {
                p.encode_into(&mut buf);
                0
            }
            Page::Hash(p) => {
                p.encode_into(pgno, &mut buf, layout)?;
                0
            }
            Page::Var(p) => {
                p.encode_into(pgno, &mut buf)?;
                0
            }
            Page::Inner(p) => p.encode_into(pgno, &mut buf, layout)?,
            Page::Leaf(p) => {
                p.encode_into(pgno, &mut buf, layout)?;
                0
            }
        };
        buf[TAG_OFFSET] = self.kind() as u8;
        buf[FLAGS_OFFSET] = flags;
        seal(&mut buf);
        Ok(buf)
    }
}

/// Read the tag of a raw page without decoding it
pub fn raw_kind(buf: &[u8]) -> Option<PageKind> {
    buf.get(TAG_OFFSET).copied().and_then(PageKind::from_tag)
}

fn compute_checksum(buf: &[u8]) -> u32 {
    crc32fast::hash(&buf[TAG_OFFSET..])
}

fn stored_checksum(buf: &[u8]) -> u32 {
    (&buf[..TAG_OFFSET]).get_u32_le()
}

/// Refresh the checksum field of a raw page
pub fn seal(buf: &mut [u8]) {
    let crc = compute_checksum(buf);
    buf[..TAG_OFFSET].copy_from_slice(&crc.to_le_bytes());
}

// =============================================================================
// Free Page
// =============================================================================

/// A page on the free list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreePage {
    /// Next free page (NIL ends the list)
    pub next: Pgno,
}

impl FreePage {
    fn decode(buf: &[u8]) -> Self {
        let mut src = &buf[COMMON_HEADER_SIZE..];
        Self {
            next: src.get_u32_le(),
        }
    }

    fn encode_into(&self, buf: &mut [u8]) {
        let mut out = &mut buf[COMMON_HEADER_SIZE..];
        out.put_u32_le(self.next);
    }
}

// =============================================================================
// Leaf Page
// =============================================================================

/// A contiguous slice of a variable's serialized content
///
/// ```text
/// ┌────────────┬──────────┬──────────────────────────────┐
/// │ Header (8) │ Used (4) │ Data (used bytes) ... zeros  │
/// └────────────┴──────────┴──────────────────────────────┘
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeafPage {
    pub data: Vec<u8>,
}

impl LeafPage {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Content length in bytes
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Move bytes `at..` into a new right sibling
    pub fn split_off(&mut self, at: usize) -> LeafPage {
        LeafPage {
            data: self.data.split_off(at),
        }
    }

    fn decode(pgno: Pgno, buf: &[u8], layout: &PageLayout) -> Result<Self> {
        let used = (&buf[COMMON_HEADER_SIZE..]).get_u32_le() as usize;
        if used > layout.leaf_capacity() {
            return Err(NumstoreError::corrupt(
                pgno,
                format!(
                    "leaf holds {} bytes, capacity is {}",
                    used,
                    layout.leaf_capacity()
                ),
            ));
        }
        Ok(Self {
            data: buf[LEAF_HEADER_SIZE..LEAF_HEADER_SIZE + used].to_vec(),
        })
    }

    fn encode_into(&self, pgno: Pgno, buf: &mut [u8], layout: &PageLayout) -> Result<()> {
        if self.data.len() > layout.leaf_capacity() {
            return Err(NumstoreError::corrupt(
                pgno,
                format!(
                    "refusing to write {} bytes into a leaf of capacity {}",
                    self.data.len(),
                    layout.leaf_capacity()
                ),
            ));
        }
        let mut out = &mut buf[COMMON_HEADER_SIZE..];
        out.put_u32_le(self.data.len() as u32);
        out.put_slice(&self.data);
        Ok(())
    }
}
