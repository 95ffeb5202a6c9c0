//! Range removal and rebalancing.
//!
//! A range is removed one leaf at a time: descend to the range start, cut
//! what that leaf holds, then walk back up fixing each parent:
//!
//! - an emptied child is freed and dropped from its parent
//! - an underfull child merges with a sibling when both fit one page,
//!   otherwise the two split their content evenly
//! - a root left with a single child is freed and its child becomes the root

use tracing::debug;

use super::tree::{self, child_kind, Descent, Node, PathEntry};
use super::{check_aligned, check_stride, to_usize, Cursor};
use crate::arena::ArenaSlice;
use crate::error::{NumstoreError, Result};
use crate::pager::{InnerNode, Page, PageLayout, Pgno, VarPage};

/// Outcome of fixing an underfull pair of siblings
enum Rebalanced {
    Merged(Node),
    Redistributed(Node, Node),
}

impl<'a> Cursor<'a> {
    /// Remove `len` bytes starting at `offset`, returning them in the arena
    pub fn remove(&mut self, name: &str, offset: u64, len: u64) -> Result<ArenaSlice> {
        self.remove_strided(name, offset, len, 1)
    }

    /// Remove every `stride`-th element starting at `offset`.
    ///
    /// `len` is the number of bytes removed, so the range covers
    /// `(len / size - 1) * stride + 1` elements. The removed elements are
    /// returned back to back.
    pub fn remove_strided(
        &mut self,
        name: &str,
        offset: u64,
        len: u64,
        stride: u32,
    ) -> Result<ArenaSlice> {
        // Step 1: Validate before touching any page
        let (var_pgno, mut var) = self.open_var(name)?;
        check_stride(stride)?;
        let size = var.ty.byte_size();
        let span = if stride == 1 || len < size {
            Some(len)
        } else {
            (len / size - 1)
                .checked_mul(u64::from(stride))
                .and_then(|n| n.checked_add(1))
                .and_then(|n| n.checked_mul(size))
        };
        let in_range = span
            .and_then(|span| offset.checked_add(span))
            .is_some_and(|end| end <= var.length);
        if !in_range {
            return Err(NumstoreError::OffsetOutOfRange {
                offset,
                length: var.length,
            });
        }
        check_aligned(&var.ty, "offset", offset)?;
        check_aligned(&var.ty, "length", len)?;
        let out = self.arena.allocate(to_usize(len)?, 1)?;

        // Step 2: Cut leaf by leaf; later content slides down to each start
        let (segments, segment_len) = if stride == 1 { (1, len) } else { (len / size, size) };
        let gap = u64::from(stride - 1) * size;
        let mut done = 0u64;
        for k in 0..segments {
            // Earlier elements are gone, so the next one sits `gap` further on
            let start = offset + k * gap;
            let mut cut = 0u64;
            while cut < segment_len {
                let at = to_usize(done + cut)?;
                cut += self.remove_from_leaf(&mut var, start, segment_len - cut, out, at)?;
            }
            done += segment_len;
        }

        // Step 3: Publish
        var.length -= len;
        self.pager.write_page(var_pgno, &Page::Var(var))?;
        Ok(out)
    }

    /// Remove up to `want` bytes from the leaf covering `offset`
    fn remove_from_leaf(
        &mut self,
        var: &mut VarPage,
        offset: u64,
        want: u64,
        out: ArenaSlice,
        at: usize,
    ) -> Result<u64> {
        let layout = *self.pager.layout();
        let Descent {
            mut path,
            leaf_pgno,
            mut leaf,
            rel,
        } = tree::descend(self.pager, var.root, offset)?;
        let rel = rel as usize;

        let take = (want as usize).min(leaf.data.len().saturating_sub(rel));
        if take == 0 {
            return Err(NumstoreError::corrupt(
                leaf_pgno,
                "leaf shorter than its parent records",
            ));
        }
        self.arena.bytes_mut(out)[at..at + take].copy_from_slice(&leaf.data[rel..rel + take]);
        leaf.data.drain(rel..rel + take);

        let delta = -(take as i64);
        let mut child_pgno = leaf_pgno;
        let mut child = Node::Leaf(leaf);
        while let Some(PathEntry { pgno, mut node, index }) = path.pop() {
            node.adjust_child(index, delta);
            self.rebalance_child(&layout, &mut node, index, child_pgno, child)?;
            child_pgno = pgno;
            child = Node::Inner(node);
        }

        var.root = self.settle_root(child_pgno, child)?;
        Ok(take as u64)
    }

    /// Write back child `index` of `parent`, fixing it if it shrank too far
    fn rebalance_child(
        &mut self,
        layout: &PageLayout,
        parent: &mut InnerNode,
        index: usize,
        pgno: Pgno,
        child: Node,
    ) -> Result<()> {
        if child.len() == 0 && parent.nchildren() > 1 {
            self.free_node(pgno, &child)?;
            parent.remove_child(index);
            debug!(pgno, "dropped empty child");
            return Ok(());
        }

        if parent.nchildren() == 1 || !child.is_underfull(layout) {
            return self.pager.write_page(pgno, &child.into_page());
        }

        // Pair with the right sibling, or the left one for the last child
        let kind = child.kind();
        let (left_idx, left, right) = if index + 1 < parent.nchildren() {
            let sibling = Node::read(self.pager, parent.child(index + 1), kind)?;
            (index, child, sibling)
        } else {
            let sibling = Node::read(self.pager, parent.child(index - 1), kind)?;
            (index - 1, sibling, child)
        };
        let left_pgno = parent.child(left_idx);
        let right_pgno = parent.child(left_idx + 1);

        match merge_or_redistribute(layout, left_pgno, left, right)? {
            Rebalanced::Merged(merged) => {
                self.pager.write_page(left_pgno, &merged.into_page())?;
                self.pager.free(right_pgno)?;
                parent.remove_key(left_idx);
                debug!(left = left_pgno, right = right_pgno, "merged siblings");
            }
            Rebalanced::Redistributed(left, right) => {
                let boundary = parent.child_start(left_idx) + left.len();
                self.pager.write_page(left_pgno, &left.into_page())?;
                self.pager.write_page(right_pgno, &right.into_page())?;
                parent.set_boundary(left_idx, boundary);
                debug!(left = left_pgno, right = right_pgno, "redistributed siblings");
            }
        }
        Ok(())
    }

    /// Write the root back, collapsing single-child roots; returns the root
    fn settle_root(&mut self, pgno: Pgno, node: Node) -> Result<Pgno> {
        let mut pgno = pgno;
        let mut node = node;
        loop {
            match node {
                Node::Inner(inner) if inner.nchildren() == 1 => {
                    let child = inner.child(0);
                    let kind = child_kind(&inner);
                    self.pager.free(pgno)?;
                    debug!(old_root = pgno, new_root = child, "collapsed root");
                    node = Node::read(self.pager, child, kind)?;
                    pgno = child;
                }
                other => {
                    self.pager.write_page(pgno, &other.into_page())?;
                    return Ok(pgno);
                }
            }
        }
    }

    /// Free a detached subtree
    fn free_node(&mut self, pgno: Pgno, node: &Node) -> Result<()> {
        if let Node::Inner(inner) = node {
            for &child in inner.children() {
                for page in tree::collect_post_order(self.pager, child)? {
                    self.pager.free(page)?;
                }
            }
        }
        self.pager.free(pgno)
    }
}

fn merge_or_redistribute(
    layout: &PageLayout,
    left_pgno: Pgno,
    left: Node,
    right: Node,
) -> Result<Rebalanced> {
    match (left, right) {
        (Node::Leaf(mut left), Node::Leaf(right)) => {
            let total = left.data.len() + right.data.len();
            left.data.extend_from_slice(&right.data);
            if total <= layout.leaf_capacity() {
                Ok(Rebalanced::Merged(Node::Leaf(left)))
            } else {
                let right = left.split_off(total / 2);
                Ok(Rebalanced::Redistributed(Node::Leaf(left), Node::Leaf(right)))
            }
        }
        (Node::Inner(mut left), Node::Inner(right)) => {
            let fits = left.nkeys() + right.nkeys() < left.capacity();
            left.absorb(right);
            if fits {
                Ok(Rebalanced::Merged(Node::Inner(left)))
            } else {
                let (right, _) = left.split();
                Ok(Rebalanced::Redistributed(Node::Inner(left), Node::Inner(right)))
            }
        }
        _ => Err(NumstoreError::corrupt(
            left_pgno,
            "siblings of different page kinds",
        )),
    }
}
