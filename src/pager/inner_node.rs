//! Inner Node
//!
//! B-tree internal node indexing a variable's content by cumulative byte
//! offset instead of by sort key.
//!
//! ## Layout
//! ```text
//! ┌────────────┬───────────┬───────────┬──────────────────┬──────────────────────┐
//! │ Header (8) │ NKeys (4) │ Total (8) │ Keys: u64 x cap  │ Children: u32 x cap+1│
//! └────────────┴───────────┴───────────┴──────────────────┴──────────────────────┘
//! ```
//! Header flag bit 0 is set when the children are leaves.
//!
//! ## Key semantics
//! `key[i]` is the exclusive upper bound of the offsets covered by children
//! `0..=i`, relative to the start of this node. The last child covers
//! `key[nkeys-1]..total`. Keys are strictly increasing. Any change to a
//! child's length must shift every key at or after that child and `total`.

use bytes::{Buf, BufMut};

use super::page::COMMON_HEADER_SIZE;
use super::{PageLayout, Pgno};
use crate::error::{NumstoreError, Result};

/// Inner header: common + nkeys (4) + total (8)
pub const INNER_HEADER_SIZE: usize = COMMON_HEADER_SIZE + 12;

/// One key (8) plus one child (4)
pub const INNER_ENTRY_SIZE: usize = 12;

const FLAG_LEAF_CHILDREN: u8 = 0x01;

/// Decoded inner node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerNode {
    leaf_children: bool,
    keys: Vec<u64>,
    children: Vec<Pgno>,
    total: u64,
    capacity: usize,
}

impl InnerNode {
    /// Build a node from `(child, length)` pairs in offset order
    pub fn from_children(layout: &PageLayout, leaf_children: bool, children: &[(Pgno, u64)]) -> Self {
        let mut keys = Vec::with_capacity(children.len().saturating_sub(1));
        let mut total = 0u64;
        for (i, (_, len)) in children.iter().enumerate() {
            total += len;
            if i + 1 < children.len() {
                keys.push(total);
            }
        }

        Self {
            leaf_children,
            keys,
            children: children.iter().map(|(pgno, _)| *pgno).collect(),
            total,
            capacity: layout.inner_capacity(),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn nkeys(&self) -> usize {
        self.keys.len()
    }

    pub fn nchildren(&self) -> usize {
        self.children.len()
    }

    pub fn keys(&self) -> &[u64] {
        &self.keys
    }

    pub fn children(&self) -> &[Pgno] {
        &self.children
    }

    pub fn child(&self, index: usize) -> Pgno {
        self.children[index]
    }

    /// Total content length below this node
    pub fn total(&self) -> u64 {
        self.total
    }

    /// True when the children are leaf pages
    pub fn leaf_children(&self) -> bool {
        self.leaf_children
    }

    /// Maximum number of keys
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// No room for another key
    pub fn is_full(&self) -> bool {
        self.keys.len() >= self.capacity
    }

    /// More keys than fit on a page (transient, before a split)
    pub fn is_overfull(&self) -> bool {
        self.keys.len() > self.capacity
    }

    /// Below the minimum occupancy for a non-root node
    pub fn is_underfull(&self) -> bool {
        self.keys.len() < self.capacity / 2
    }

    /// Offset where child `index` starts
    pub fn child_start(&self, index: usize) -> u64 {
        if index == 0 {
            0
        } else {
            self.keys[index - 1]
        }
    }

    /// Exclusive end offset of child `index`
    pub fn child_end(&self, index: usize) -> u64 {
        if index < self.keys.len() {
            self.keys[index]
        } else {
            self.total
        }
    }

    pub fn child_len(&self, index: usize) -> u64 {
        self.child_end(index) - self.child_start(index)
    }

    // =========================================================================
    // Offset Resolution
    // =========================================================================

    /// Find the child covering `offset`.
    ///
    /// Returns `(index, child, offset_within_child)` where `index` is the
    /// smallest `i` with `offset < key[i]`, or the last child when no key
    /// is larger.
    pub fn resolve(&self, offset: u64) -> (usize, Pgno, u64) {
        let index = self.keys.partition_point(|&key| key <= offset);
        (index, self.children[index], offset - self.child_start(index))
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Insert `key` at `keys[index]` and `child` at `children[index + 1]`.
    ///
    /// Splits child `index`'s range at absolute offset `key`; the new child
    /// takes the upper part. Check `is_full()` first when the node must stay
    /// within one page.
    pub fn insert_key(&mut self, index: usize, key: u64, child: Pgno) {
        debug_assert!(key >= self.child_start(index) && key <= self.child_end(index));
        self.keys.insert(index, key);
        self.children.insert(index + 1, child);
    }

    /// Remove `keys[index]` and `children[index + 1]`; child `index` takes
    /// over the removed child's range. Returns the removed child.
    pub fn remove_key(&mut self, index: usize) -> Pgno {
        self.keys.remove(index);
        self.children.remove(index + 1)
    }

    /// Remove a zero-length child at any position
    pub fn remove_child(&mut self, index: usize) -> Pgno {
        debug_assert_eq!(self.child_len(index), 0);
        if index == 0 {
            if !self.keys.is_empty() {
                self.keys.remove(0);
            }
            self.children.remove(0)
        } else {
            self.remove_key(index - 1)
        }
    }

    /// Shift every boundary at or after child `index` by `delta` bytes
    pub fn adjust_child(&mut self, index: usize, delta: i64) {
        for key in &mut self.keys[index..] {
            *key = key.saturating_add_signed(delta);
        }
        self.total = self.total.saturating_add_signed(delta);
    }

    /// Move the boundary between child `index` and `index + 1`
    pub fn set_boundary(&mut self, index: usize, key: u64) {
        debug_assert!(key > self.child_start(index));
        self.keys[index] = key;
    }

    /// Move the upper half of the children into a new right sibling.
    ///
    /// Returns the right node and the promoted key: the left half's total,
    /// which is also where the right half starts relative to this node.
    pub fn split(&mut self) -> (InnerNode, u64) {
        let mid = self.children.len() / 2;
        debug_assert!(mid >= 1);

        let right_children = self.children.split_off(mid);
        let promoted = self.keys[mid - 1];
        let right_keys: Vec<u64> = self.keys[mid..].iter().map(|k| k - promoted).collect();
        self.keys.truncate(mid - 1);

        let right = InnerNode {
            leaf_children: self.leaf_children,
            keys: right_keys,
            children: right_children,
            total: self.total - promoted,
            capacity: self.capacity,
        };
        self.total = promoted;

        (right, promoted)
    }

    /// Halve until every piece fits on a page.
    ///
    /// `self` keeps the first piece; the rest are returned in offset order.
    /// Empty when the node already fits.
    pub fn split_to_fit(&mut self) -> Vec<InnerNode> {
        if !self.is_overfull() {
            return Vec::new();
        }
        let (mut right, _) = self.split();
        let mut pieces = self.split_to_fit();
        let right_rest = right.split_to_fit();
        pieces.push(right);
        pieces.extend(right_rest);
        pieces
    }

    /// Append every child of `right` to this node
    pub fn absorb(&mut self, right: InnerNode) {
        let base = self.total;
        self.keys.push(base);
        self.keys.extend(right.keys.iter().map(|k| k + base));
        self.children.extend(right.children);
        self.total += right.total;
    }

    // =========================================================================
    // Encoding
    // =========================================================================

    pub(super) fn decode(pgno: Pgno, buf: &[u8], flags: u8, layout: &PageLayout) -> Result<Self> {
        let capacity = layout.inner_capacity();
        let mut src = &buf[COMMON_HEADER_SIZE..];
        let nkeys = src.get_u32_le() as usize;
        let total = src.get_u64_le();

        if nkeys > capacity {
            return Err(NumstoreError::corrupt(
                pgno,
                format!("inner node has {} keys, capacity is {}", nkeys, capacity),
            ));
        }

        let mut keys_src = &buf[INNER_HEADER_SIZE..];
        let keys: Vec<u64> = (0..nkeys).map(|_| keys_src.get_u64_le()).collect();

        let mut children_src = &buf[INNER_HEADER_SIZE + capacity * 8..];
        let children: Vec<Pgno> = (0..=nkeys).map(|_| children_src.get_u32_le()).collect();

        if keys.windows(2).any(|w| w[0] >= w[1]) {
            return Err(NumstoreError::corrupt(pgno, "inner node keys not strictly increasing"));
        }
        if keys.last().is_some_and(|&last| last > total) {
            return Err(NumstoreError::corrupt(
                pgno,
                format!("inner node last key exceeds total {}", total),
            ));
        }
        if children.contains(&super::NIL) {
            return Err(NumstoreError::corrupt(pgno, "inner node has a NIL child"));
        }

        Ok(Self {
            leaf_children: flags & FLAG_LEAF_CHILDREN != 0,
            keys,
            children,
            total,
            capacity,
        })
    }

    /// Returns the header flags
    pub(super) fn encode_into(&self, pgno: Pgno, buf: &mut [u8], layout: &PageLayout) -> Result<u8> {
        let capacity = layout.inner_capacity();
        if self.keys.len() > capacity || self.children.len() != self.keys.len() + 1 {
            return Err(NumstoreError::corrupt(
                pgno,
                format!(
                    "refusing to write inner node with {} keys / {} children (capacity {})",
                    self.keys.len(),
                    self.children.len(),
                    capacity
                ),
            ));
        }

        {
            let mut out = &mut buf[COMMON_HEADER_SIZE..];
            out.put_u32_le(self.keys.len() as u32);
            out.put_u64_le(self.total);
        }
        {
            let mut out = &mut buf[INNER_HEADER_SIZE..];
            for key in &self.keys {
                out.put_u64_le(*key);
            }
        }
        {
            let mut out = &mut buf[INNER_HEADER_SIZE + capacity * 8..];
            for child in &self.children {
                out.put_u32_le(*child);
            }
        }

        Ok(if self.leaf_children {
            FLAG_LEAF_CHILDREN
        } else {
            0
        })
    }
}
