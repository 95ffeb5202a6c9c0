//! Tests for Inner Nodes
//!
//! These tests verify:
//! - Offset resolution against cumulative keys
//! - Key/child insertion, removal and boundary propagation
//! - Split, absorb and split-to-fit
//! - Page round trip and decode validation

use numstore::pager::{InnerNode, Page, PageLayout, Pager, PagerOptions};
use numstore::NumstoreError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn layout() -> PageLayout {
    PageLayout::new(128).unwrap()
}

/// Node over children 10..=N with the given lengths
fn node(lengths: &[u64]) -> InnerNode {
    let children: Vec<(u32, u64)> = lengths
        .iter()
        .enumerate()
        .map(|(i, len)| (10 + i as u32, *len))
        .collect();
    InnerNode::from_children(&layout(), true, &children)
}

// =============================================================================
// Resolution Tests
// =============================================================================

#[test]
fn test_capacity_from_layout() {
    // (128 - 24) / 12
    assert_eq!(layout().inner_capacity(), 8);
    assert_eq!(node(&[1, 1]).capacity(), 8);
}

#[test]
fn test_from_children_builds_cumulative_keys() {
    let n = node(&[10, 15, 15, 5]);
    assert_eq!(n.keys(), &[10, 25, 40]);
    assert_eq!(n.children(), &[10, 11, 12, 13]);
    assert_eq!(n.total(), 45);
}

#[test]
fn test_resolve() {
    let n = node(&[10, 15, 15, 5]);

    assert_eq!(n.resolve(0), (0, 10, 0));
    assert_eq!(n.resolve(9), (0, 10, 9));
    assert_eq!(n.resolve(10), (1, 11, 0));
    assert_eq!(n.resolve(30), (2, 12, 5));
    assert_eq!(n.resolve(40), (3, 13, 0));
    // At the very end: last child, one past its content
    assert_eq!(n.resolve(45), (3, 13, 5));
}

#[test]
fn test_child_ranges() {
    let n = node(&[10, 15, 15, 5]);
    assert_eq!(n.child_start(0), 0);
    assert_eq!(n.child_start(2), 25);
    assert_eq!(n.child_len(1), 15);
    assert_eq!(n.child_len(3), 5);
}

// =============================================================================
// Mutation Tests
// =============================================================================

#[test]
fn test_adjust_child_shifts_later_keys() {
    let mut n = node(&[10, 15, 15]);
    n.adjust_child(1, 7);
    assert_eq!(n.keys(), &[10, 32]);
    assert_eq!(n.total(), 47);

    n.adjust_child(0, -4);
    assert_eq!(n.keys(), &[6, 28]);
    assert_eq!(n.total(), 43);
}

#[test]
fn test_insert_key_splits_child_range() {
    let mut n = node(&[10, 20]);
    // child 1 covers 10..30; a new child takes 18..30
    n.insert_key(1, 18, 99);
    assert_eq!(n.keys(), &[10, 18]);
    assert_eq!(n.children(), &[10, 11, 99]);
    assert_eq!(n.child_len(1), 8);
    assert_eq!(n.child_len(2), 12);
}

#[test]
fn test_remove_key_merges_ranges() {
    let mut n = node(&[10, 20, 5]);
    assert_eq!(n.remove_key(0), 11);
    assert_eq!(n.keys(), &[30]);
    assert_eq!(n.children(), &[10, 12]);
}

#[test]
fn test_remove_child_first_and_last() {
    let mut n = node(&[10, 20, 5]);
    n.adjust_child(0, -10);
    assert_eq!(n.remove_child(0), 10);
    assert_eq!(n.keys(), &[20]);
    assert_eq!(n.children(), &[11, 12]);

    n.adjust_child(1, -5);
    assert_eq!(n.remove_child(1), 12);
    assert!(n.keys().is_empty());
    assert_eq!(n.children(), &[11]);
    assert_eq!(n.total(), 20);
}

#[test]
fn test_split_promotes_left_total() {
    let mut left = node(&[1, 2, 3, 4, 5, 6]);
    let (right, promoted) = left.split();

    assert_eq!(promoted, 6);
    assert_eq!(left.children(), &[10, 11, 12]);
    assert_eq!(left.keys(), &[1, 3]);
    assert_eq!(left.total(), 6);

    assert_eq!(right.children(), &[13, 14, 15]);
    assert_eq!(right.keys(), &[4, 9]);
    assert_eq!(right.total(), 15);
}

#[test]
fn test_absorb_is_inverse_of_split() {
    let original = node(&[1, 2, 3, 4, 5, 6, 7]);
    let mut left = original.clone();
    let (right, _) = left.split();
    left.absorb(right);
    assert_eq!(left, original);
}

#[test]
fn test_split_to_fit() {
    let lengths: Vec<u64> = (1..=30).collect();
    let mut n = node(&lengths);
    assert!(n.is_overfull());

    let rest = n.split_to_fit();
    assert!(!rest.is_empty());
    assert!(!n.is_overfull());
    assert!(rest.iter().all(|p| !p.is_overfull()));

    let total: u64 = n.total() + rest.iter().map(|p| p.total()).sum::<u64>();
    assert_eq!(total, lengths.iter().sum::<u64>());

    let mut children = n.children().to_vec();
    for piece in &rest {
        children.extend_from_slice(piece.children());
    }
    assert_eq!(children, (10..40).collect::<Vec<u32>>());
}

#[test]
fn test_occupancy_predicates() {
    let n = node(&[1; 9]);
    assert!(n.is_full());
    assert!(!n.is_overfull());
    assert!(!n.is_underfull());

    assert!(node(&[1, 1, 1]).is_underfull());
    assert!(node(&[1; 10]).is_overfull());
}

// =============================================================================
// Encoding Tests
// =============================================================================

#[test]
fn test_inner_node_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let options = PagerOptions {
        page_size: 128,
        ..PagerOptions::default()
    };
    let mut pager = Pager::open(temp_dir.path().join("inner.db"), &options).unwrap();

    let n = node(&[10, 15, 15, 5]);
    let pgno = pager.allocate().unwrap();
    pager.write_page(pgno, &Page::Inner(n.clone())).unwrap();

    let read = pager.read_inner(pgno).unwrap();
    assert_eq!(read, n);
    assert!(read.leaf_children());
}

#[test]
fn test_overfull_node_refuses_to_encode() {
    let n = node(&[1; 10]);
    let err = Page::Inner(n).encode(5, &layout()).unwrap_err();
    assert!(matches!(err, NumstoreError::CorruptPage { pgno: 5, .. }));
}

#[test]
fn test_decode_rejects_unordered_keys() {
    let mut buf = Page::Inner(node(&[10, 15])).encode(5, &layout()).unwrap();
    // nkeys = 1 with key[0] = 10; bump nkeys to 2 so key[1] reads as 0
    buf[8] = 2;
    let err = Page::decode(5, &buf, &layout(), false).unwrap_err();
    assert!(matches!(err, NumstoreError::CorruptPage { .. }));
}
