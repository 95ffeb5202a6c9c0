//! Insert and append.
//!
//! ```text
//!   leaf before:  [ head | tail ]            (rel = head.len())
//!   spliced:      [ head | value | tail ]    (may exceed one page)
//!   chunked:      [ piece 0 ][ piece 1 ] ... [ piece n ]
//!                   in place   new leaves, linked into the parent
//! ```
//! Pieces are packed full when the value lands at the end of the leaf
//! (appends keep earlier leaves full) and sized evenly otherwise. The new
//! leaves are inserted into the parent after the original one; any inner
//! node that overflows splits and hands its new siblings to its own parent,
//! and a root that splits gets a new root above it.

use tracing::debug;

use super::tree::{self, Descent, PathEntry};
use super::{check_aligned, Cursor};
use crate::arena::ArenaSlice;
use crate::error::{NumstoreError, Result};
use crate::pager::{InnerNode, LeafPage, Page, PageLayout, Pgno, NIL};
use crate::types::Value;

impl<'a> Cursor<'a> {
    /// Insert `value` at byte `offset` of `name`, shifting later content
    pub fn insert(&mut self, name: &str, value: &Value, offset: u64) -> Result<()> {
        // Step 1: Validate before touching any page
        let (var_pgno, mut var) = self.open_var(name)?;
        if offset > var.length {
            return Err(NumstoreError::OffsetOutOfRange {
                offset,
                length: var.length,
            });
        }
        check_aligned(&var.ty, "offset", offset)?;
        if !value.conforms_to(&var.ty) {
            return Err(NumstoreError::TypeMismatch(format!(
                "value does not conform to {} variable {:?}",
                var.ty, name
            )));
        }

        // Step 2: Serialize into the arena
        let len = value.serialized_len();
        let bytes = self.arena.allocate(len, 1)?;
        value.serialize_into(self.arena.bytes_mut(bytes));

        // Step 3: Splice into the tree and publish the new root and length
        var.root = self.splice(var.root, offset, bytes)?;
        var.length += len as u64;
        self.pager.write_page(var_pgno, &Page::Var(var))?;
        Ok(())
    }

    /// Insert `value` at the end of `name`
    pub fn append(&mut self, name: &str, value: &Value) -> Result<()> {
        let (_, var) = self.open_var(name)?;
        self.insert(name, value, var.length)
    }

    /// Splice the arena bytes into the tree at `offset`; returns the root.
    ///
    /// Every page the splice needs is allocated before the first write, so
    /// `OutOfSpace` leaves the tree as it was.
    fn splice(&mut self, root: Pgno, offset: u64, bytes: ArenaSlice) -> Result<Pgno> {
        let layout = *self.pager.layout();
        let Descent {
            path,
            leaf_pgno,
            mut leaf,
            rel,
        } = tree::descend(self.pager, root, offset)?;
        let rel = rel as usize;

        // Step 1: Park the leaf tail in the arena and lay out the pieces
        let fill_left = rel == leaf.data.len();
        let tail = self.arena.alloc_copy(&leaf.data[rel..])?;
        leaf.data.truncate(rel);
        let total = rel + bytes.len() + tail.len();
        let ranges = chunk_ranges(total, layout.leaf_capacity(), fill_left);
        let lens: Vec<u64> = ranges.iter().map(|&(s, e)| (e - s) as u64).collect();
        let delta = bytes.len() as i64;

        // Step 2: Count the pages the cascade needs, then reserve them
        let mut needed = 0usize;
        plan_cascade(&layout, path.clone(), leaf_pgno, &lens, delta, &mut || {
            needed += 1;
            NIL
        });
        let mut reserved = self.pager.allocate_many(needed)?.into_iter();
        let plan = plan_cascade(&layout, path, leaf_pgno, &lens, delta, &mut || {
            reserved.next().unwrap_or(NIL)
        });

        // Step 3: New leaves first
        let content = Spliced {
            parts: [&leaf.data, self.arena.bytes(bytes), self.arena.bytes(tail)],
        };
        for (&pgno, &(start, end)) in plan.leaves.iter().zip(&ranges[1..]) {
            let piece = LeafPage::new(content.copy_range(start, end));
            self.pager.write_page(pgno, &Page::Leaf(piece))?;
        }
        if !plan.leaves.is_empty() {
            debug!(leaf = leaf_pgno, new_leaves = plan.leaves.len(), "split leaf");
        }

        // Step 4: Inner nodes bottom-up, then the original leaf
        for (pgno, node) in plan.inners {
            self.pager.write_page(pgno, &Page::Inner(node))?;
        }
        let (start, end) = ranges[0];
        let piece = LeafPage::new(content.copy_range(start, end));
        self.pager.write_page(leaf_pgno, &Page::Leaf(piece))?;

        if plan.root != root {
            debug!(root = plan.root, "grew tree");
        }
        Ok(plan.root)
    }
}

/// Pages a splice writes, worked out before any of them is touched
struct Cascade {
    /// Pages for every leaf piece after the first
    leaves: Vec<Pgno>,
    /// Inner nodes to write, children before parents
    inners: Vec<(Pgno, InnerNode)>,
    root: Pgno,
}

/// Propagate a leaf split into `lens` pieces up `path`.
///
/// `next_pgno` hands out page numbers for new pages in the order they are
/// needed; a run with a counting closure gives the number of pages the
/// real run takes.
fn plan_cascade(
    layout: &PageLayout,
    mut path: Vec<PathEntry>,
    leaf_pgno: Pgno,
    lens: &[u64],
    delta: i64,
    next_pgno: &mut dyn FnMut() -> Pgno,
) -> Cascade {
    let root_is_leaf = path.is_empty();
    let leaves: Vec<Pgno> = lens[1..].iter().map(|_| next_pgno()).collect();
    let mut siblings: Vec<(Pgno, u64)> = leaves.iter().copied().zip(lens[1..].iter().copied()).collect();
    let mut inners = Vec::new();
    let mut child_len = lens[0];
    let mut top = leaf_pgno;

    while let Some(PathEntry {
        pgno,
        mut node,
        index,
    }) = path.pop()
    {
        node.adjust_child(index, delta);
        let mut boundary = node.child_start(index) + child_len;
        for (i, &(sibling, len)) in siblings.iter().enumerate() {
            node.insert_key(index + i, boundary, sibling);
            boundary += len;
        }
        siblings.clear();
        top = pgno;

        for part in node.split_to_fit() {
            let part_pgno = next_pgno();
            siblings.push((part_pgno, part.total()));
            inners.push((part_pgno, part));
        }
        child_len = node.total();
        inners.push((pgno, node));
    }

    if siblings.is_empty() {
        return Cascade {
            leaves,
            inners,
            root: top,
        };
    }

    // The old root split; stack new roots until one fits
    let mut level = Vec::with_capacity(siblings.len() + 1);
    level.push((top, child_len));
    level.extend(siblings);
    let mut leaf_children = root_is_leaf;

    loop {
        let mut node = InnerNode::from_children(layout, leaf_children, &level);
        let overflow = node.split_to_fit();
        let node_pgno = next_pgno();
        let node_total = node.total();
        inners.push((node_pgno, node));

        if overflow.is_empty() {
            return Cascade {
                leaves,
                inners,
                root: node_pgno,
            };
        }

        level = vec![(node_pgno, node_total)];
        for part in overflow {
            let part_pgno = next_pgno();
            level.push((part_pgno, part.total()));
            inners.push((part_pgno, part));
        }
        leaf_children = false;
    }
}

/// Leaf head, new bytes and leaf tail viewed as one sequence
struct Spliced<'b> {
    parts: [&'b [u8]; 3],
}

impl Spliced<'_> {
    fn len(&self) -> usize {
        self.parts.iter().map(|p| p.len()).sum()
    }

    fn copy_range(&self, start: usize, end: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(end - start);
        let mut base = 0;
        for part in self.parts {
            let lo = start.max(base);
            let hi = end.min(base + part.len());
            if lo < hi {
                out.extend_from_slice(&part[lo - base..hi - base]);
            }
            base += part.len();
        }
        out
    }
}

/// Split `total` bytes into page-sized `(start, end)` ranges.
///
/// `fill_left` packs every range but the last to `capacity`; otherwise the
/// ranges differ in length by at most one byte.
pub(super) fn chunk_ranges(total: usize, capacity: usize, fill_left: bool) -> Vec<(usize, usize)> {
    if total <= capacity {
        return vec![(0, total)];
    }

    let count = total.div_ceil(capacity);
    let mut ranges = Vec::with_capacity(count);
    let mut start = 0;

    if fill_left {
        while start < total {
            let end = (start + capacity).min(total);
            ranges.push((start, end));
            start = end;
        }
    } else {
        let base = total / count;
        let extra = total % count;
        for i in 0..count {
            let end = start + base + usize::from(i < extra);
            ranges.push((start, end));
            start = end;
        }
    }

    ranges
}
