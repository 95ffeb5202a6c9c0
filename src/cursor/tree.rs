//! Tree navigation shared by the cursor operations.

use crate::error::{NumstoreError, Result};
use crate::pager::{InnerNode, LeafPage, Page, PageKind, PageLayout, Pager, Pgno};

/// A tree page held in memory while a statement rewrites it
#[derive(Debug, Clone)]
pub(super) enum Node {
    Leaf(LeafPage),
    Inner(InnerNode),
}

impl Node {
    /// Content bytes below this node
    pub(super) fn len(&self) -> u64 {
        match self {
            Node::Leaf(leaf) => leaf.len(),
            Node::Inner(node) => node.total(),
        }
    }

    pub(super) fn kind(&self) -> PageKind {
        match self {
            Node::Leaf(_) => PageKind::Leaf,
            Node::Inner(_) => PageKind::Inner,
        }
    }

    /// Below minimum occupancy for a non-root node
    pub(super) fn is_underfull(&self, layout: &PageLayout) -> bool {
        match self {
            Node::Leaf(leaf) => (leaf.data.len()) < layout.leaf_capacity() / 2,
            Node::Inner(node) => node.is_underfull(),
        }
    }

    pub(super) fn into_page(self) -> Page {
        match self {
            Node::Leaf(leaf) => Page::Leaf(leaf),
            Node::Inner(node) => Page::Inner(node),
        }
    }

    pub(super) fn read(pager: &mut Pager, pgno: Pgno, expected: PageKind) -> Result<Node> {
        match pager.read_page(pgno)? {
            Page::Leaf(leaf) if expected == PageKind::Leaf => Ok(Node::Leaf(leaf)),
            Page::Inner(node) if expected == PageKind::Inner => Ok(Node::Inner(node)),
            other => Err(NumstoreError::InvalidPageType {
                pgno,
                expected,
                found: other.kind(),
            }),
        }
    }

    /// Read a tree root, which may be either kind
    pub(super) fn read_root(pager: &mut Pager, pgno: Pgno) -> Result<Node> {
        match pager.read_page(pgno)? {
            Page::Leaf(leaf) => Ok(Node::Leaf(leaf)),
            Page::Inner(node) => Ok(Node::Inner(node)),
            other => Err(NumstoreError::InvalidPageType {
                pgno,
                expected: PageKind::Leaf,
                found: other.kind(),
            }),
        }
    }
}

/// Kind of the children of `node`
pub(super) fn child_kind(node: &InnerNode) -> PageKind {
    if node.leaf_children() {
        PageKind::Leaf
    } else {
        PageKind::Inner
    }
}

/// One inner node on the way down, with the child index taken
#[derive(Debug, Clone)]
pub(super) struct PathEntry {
    pub pgno: Pgno,
    pub node: InnerNode,
    pub index: usize,
}

/// Result of walking from a root to the leaf covering an offset
#[derive(Debug)]
pub(super) struct Descent {
    pub path: Vec<PathEntry>,
    pub leaf_pgno: Pgno,
    pub leaf: LeafPage,
    /// Offset within the leaf
    pub rel: u64,
}

/// Walk from `root` to the leaf covering `offset`, recording the path
pub(super) fn descend(pager: &mut Pager, root: Pgno, offset: u64) -> Result<Descent> {
    let mut path = Vec::new();
    let mut pgno = root;
    let mut rel = offset;
    let mut node = Node::read_root(pager, root)?;

    loop {
        match node {
            Node::Leaf(leaf) => {
                return Ok(Descent {
                    path,
                    leaf_pgno: pgno,
                    leaf,
                    rel,
                })
            }
            Node::Inner(inner) => {
                let (index, child, child_rel) = inner.resolve(rel);
                let kind = child_kind(&inner);
                path.push(PathEntry {
                    pgno,
                    node: inner,
                    index,
                });
                // A path longer than the file means the tree has a cycle
                if path.len() >= pager.page_count() as usize {
                    return Err(NumstoreError::corrupt(
                        root,
                        "tree is deeper than the file has pages",
                    ));
                }
                node = Node::read(pager, child, kind)?;
                pgno = child;
                rel = child_rel;
            }
        }
    }
}

/// Every page of the tree rooted at `root`, children before parents
pub(super) fn collect_post_order(pager: &mut Pager, root: Pgno) -> Result<Vec<Pgno>> {
    let mut order = Vec::new();
    let mut stack = vec![root];

    while let Some(pgno) = stack.pop() {
        if let Node::Inner(node) = Node::read_root(pager, pgno)? {
            stack.extend_from_slice(node.children());
        }
        order.push(pgno);
        if order.len() > pager.page_count() as usize {
            return Err(NumstoreError::corrupt(root, "tree references more pages than the file holds"));
        }
    }

    // Pre-order with the stack; reversed it lists every child before its parent
    order.reverse();
    Ok(order)
}
