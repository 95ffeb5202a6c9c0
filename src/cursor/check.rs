//! Structural validation of a variable's content tree.

use std::collections::HashSet;

use tracing::trace;

use super::tree::{child_kind, Node};
use super::Cursor;
use crate::error::{NumstoreError, Result};
use crate::pager::{PageKind, Pgno};

/// Shape of one variable's content tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Levels including the leaves; a lone root leaf is height 1
    pub height: u32,
    pub leaves: u64,
    pub inner_nodes: u64,
    /// Content length in bytes
    pub length: u64,
}

impl<'a> Cursor<'a> {
    /// Walk the whole tree of `name` and verify its invariants:
    /// - every leaf sits at the same depth
    /// - every node holds exactly the length its parent records
    /// - inner nodes have at least two children of one kind
    /// - non-root inner nodes hold at least half their key capacity
    /// - non-root leaves are not empty
    /// - no page is reachable twice
    ///
    /// Key ordering and page capacities are checked when each page decodes.
    pub fn check(&mut self, name: &str) -> Result<TreeStats> {
        let (_, var) = self.open_var(name)?;

        let mut stats = TreeStats {
            length: var.length,
            ..TreeStats::default()
        };
        let mut seen: HashSet<Pgno> = HashSet::new();
        let mut leaf_depth: Option<u32> = None;

        // (page, expected kind (None for the root), expected length, depth)
        let mut stack: Vec<(Pgno, Option<PageKind>, u64, u32)> = vec![(var.root, None, var.length, 1)];

        while let Some((pgno, expected, len, depth)) = stack.pop() {
            if !seen.insert(pgno) {
                return Err(NumstoreError::corrupt(pgno, "page reachable twice"));
            }

            let node = match expected {
                Some(kind) => Node::read(self.pager, pgno, kind)?,
                None => Node::read_root(self.pager, pgno)?,
            };
            if node.len() != len {
                return Err(NumstoreError::corrupt(
                    pgno,
                    format!("holds {} bytes, parent records {}", node.len(), len),
                ));
            }

            match node {
                Node::Leaf(leaf) => {
                    if expected.is_some() && leaf.is_empty() {
                        return Err(NumstoreError::corrupt(pgno, "empty non-root leaf"));
                    }
                    match leaf_depth {
                        None => leaf_depth = Some(depth),
                        Some(d) if d != depth => {
                            return Err(NumstoreError::corrupt(
                                pgno,
                                format!("leaf at depth {}, others at {}", depth, d),
                            ))
                        }
                        Some(_) => {}
                    }
                    stats.leaves += 1;
                }
                Node::Inner(inner) => {
                    if inner.nchildren() < 2 {
                        return Err(NumstoreError::corrupt(pgno, "inner node with a single child"));
                    }
                    if expected.is_some() && inner.is_underfull() {
                        return Err(NumstoreError::corrupt(
                            pgno,
                            format!(
                                "non-root inner node holds {} keys, minimum is {}",
                                inner.nkeys(),
                                inner.capacity() / 2
                            ),
                        ));
                    }
                    let kind = child_kind(&inner);
                    for i in 0..inner.nchildren() {
                        stack.push((inner.child(i), Some(kind), inner.child_len(i), depth + 1));
                    }
                    stats.inner_nodes += 1;
                }
            }
        }

        stats.height = leaf_depth.unwrap_or(0);
        trace!(name, ?stats, "tree check passed");
        Ok(stats)
    }
}
