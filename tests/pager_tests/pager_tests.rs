//! Tests for the Pager
//!
//! These tests verify:
//! - Formatting a new file and reopening it
//! - Allocation: free list reuse before file extension, zeroed pages
//! - Free: range and double-free checks
//! - Typed reads and checksum verification
//! - max_pages enforcement

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};

use numstore::pager::{LeafPage, Page, PageKind, Pager, PagerOptions, NIL};
use numstore::NumstoreError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn small_options() -> PagerOptions {
    PagerOptions {
        page_size: 256,
        max_pages: None,
        verify_checksums: true,
    }
}

fn setup_temp_pager() -> (TempDir, Pager) {
    let temp_dir = TempDir::new().unwrap();
    let pager = Pager::open(temp_dir.path().join("test.db"), &small_options()).unwrap();
    (temp_dir, pager)
}

fn leaf(bytes: &[u8]) -> Page {
    Page::Leaf(LeafPage::new(bytes.to_vec()))
}

// =============================================================================
// Open / Format Tests
// =============================================================================

#[test]
fn test_format_new_file() {
    let (_dir, pager) = setup_temp_pager();

    assert_eq!(pager.page_size(), 256);
    assert_eq!(pager.page_count(), 2);
    assert_eq!(pager.root_hash(), 1);
    assert_eq!(pager.free_list_len(), 0);
}

#[test]
fn test_reopen_preserves_superblock() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.db");

    {
        let mut pager = Pager::open(&path, &small_options()).unwrap();
        let a = pager.allocate().unwrap();
        let b = pager.allocate().unwrap();
        pager.write_page(a, &leaf(b"hello")).unwrap();
        pager.free(b).unwrap();
        pager.sync().unwrap();
    }

    let mut pager = Pager::open(&path, &small_options()).unwrap();
    assert_eq!(pager.page_count(), 4);
    assert_eq!(pager.free_list_len(), 1);
    assert_eq!(pager.free_list().unwrap(), vec![3]);
    assert_eq!(pager.read_leaf(2).unwrap().data, b"hello");
}

#[test]
fn test_existing_page_size_wins() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.db");
    drop(Pager::open(&path, &small_options()).unwrap());

    let options = PagerOptions {
        page_size: 4096,
        ..small_options()
    };
    let pager = Pager::open(&path, &options).unwrap();
    assert_eq!(pager.page_size(), 256);
}

#[test]
fn test_open_rejects_bad_magic() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.db");
    std::fs::write(&path, vec![0xAB; 512]).unwrap();

    let err = Pager::open(&path, &small_options()).unwrap_err();
    assert!(matches!(err, NumstoreError::CorruptPage { pgno: 0, .. }));
}

#[test]
fn test_open_rejects_truncated_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.db");
    {
        let mut pager = Pager::open(&path, &small_options()).unwrap();
        pager.allocate().unwrap();
        pager.allocate().unwrap();
    }
    let file = OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(256 * 3).unwrap();

    assert!(matches!(
        Pager::open(&path, &small_options()),
        Err(NumstoreError::CorruptPage { .. })
    ));
}

// =============================================================================
// Allocation Tests
// =============================================================================

#[test]
fn test_allocate_extends_file() {
    let (_dir, mut pager) = setup_temp_pager();
    assert_eq!(pager.allocate().unwrap(), 2);
    assert_eq!(pager.allocate().unwrap(), 3);
    assert_eq!(pager.page_count(), 4);
}

#[test]
fn test_free_list_reused_before_extension() {
    let (_dir, mut pager) = setup_temp_pager();
    let a = pager.allocate().unwrap();
    let b = pager.allocate().unwrap();
    let c = pager.allocate().unwrap();

    pager.free(a).unwrap();
    pager.free(c).unwrap();
    assert_eq!(pager.free_list_len(), 2);
    assert_eq!(pager.free_list().unwrap(), vec![c, a]);

    // LIFO reuse, then extension
    assert_eq!(pager.allocate().unwrap(), c);
    assert_eq!(pager.allocate().unwrap(), a);
    assert_eq!(pager.free_list_len(), 0);
    assert_eq!(pager.allocate().unwrap(), b + 2);
}

#[test]
fn test_allocated_page_is_zeroed() {
    let (_dir, mut pager) = setup_temp_pager();
    let pgno = pager.allocate().unwrap();
    pager.write_page(pgno, &leaf(&[0xFF; 100])).unwrap();
    pager.free(pgno).unwrap();

    let again = pager.allocate().unwrap();
    assert_eq!(again, pgno);
    assert!(pager.read(again).unwrap().iter().all(|&b| b == 0));
}

#[test]
fn test_max_pages_out_of_space() {
    let temp_dir = TempDir::new().unwrap();
    let options = PagerOptions {
        max_pages: Some(3),
        ..small_options()
    };
    let mut pager = Pager::open(temp_dir.path().join("test.db"), &options).unwrap();

    let pgno = pager.allocate().unwrap();
    assert!(matches!(pager.allocate(), Err(NumstoreError::OutOfSpace(_))));

    // Freed pages are still usable at the cap
    pager.write_page(pgno, &leaf(b"x")).unwrap();
    pager.free(pgno).unwrap();
    assert_eq!(pager.allocate().unwrap(), pgno);
}

// =============================================================================
// Free Tests
// =============================================================================

#[test]
fn test_free_rejects_nil_and_out_of_range() {
    let (_dir, mut pager) = setup_temp_pager();
    assert!(matches!(pager.free(NIL), Err(NumstoreError::CorruptPage { .. })));
    assert!(matches!(pager.free(99), Err(NumstoreError::CorruptPage { .. })));
}

#[test]
fn test_double_free_detected() {
    let (_dir, mut pager) = setup_temp_pager();
    let pgno = pager.allocate().unwrap();
    pager.write_page(pgno, &leaf(b"data")).unwrap();
    pager.free(pgno).unwrap();

    assert!(matches!(pager.free(pgno), Err(NumstoreError::CorruptPage { .. })));
    assert_eq!(pager.free_list_len(), 1);
}

// =============================================================================
// Typed I/O Tests
// =============================================================================

#[test]
fn test_typed_read_wrong_kind() {
    let (_dir, mut pager) = setup_temp_pager();
    let root = pager.root_hash();

    let err = pager.read_leaf(root).unwrap_err();
    assert!(matches!(
        err,
        NumstoreError::InvalidPageType {
            expected: PageKind::Leaf,
            found: PageKind::Hash,
            ..
        }
    ));
}

#[test]
fn test_zeroed_page_has_no_type() {
    let (_dir, mut pager) = setup_temp_pager();
    let pgno = pager.allocate().unwrap();
    assert!(matches!(pager.read_page(pgno), Err(NumstoreError::CorruptPage { .. })));
}

#[test]
fn test_read_beyond_end_is_corrupt() {
    let (_dir, mut pager) = setup_temp_pager();
    assert!(matches!(pager.read(42), Err(NumstoreError::CorruptPage { pgno: 42, .. })));
}

#[test]
fn test_checksum_mismatch_detected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.db");
    let pgno;
    {
        let mut pager = Pager::open(&path, &small_options()).unwrap();
        pgno = pager.allocate().unwrap();
        pager.write_page(pgno, &leaf(b"checksummed")).unwrap();
    }

    // Flip one data byte behind the pager's back
    let mut file = OpenOptions::new().write(true).open(&path).unwrap();
    file.seek(SeekFrom::Start(pgno as u64 * 256 + 14)).unwrap();
    file.write_all(&[b'X']).unwrap();
    drop(file);

    let mut pager = Pager::open(&path, &small_options()).unwrap();
    assert!(matches!(
        pager.read_leaf(pgno),
        Err(NumstoreError::CorruptPage { .. })
    ));

    let lenient = PagerOptions {
        verify_checksums: false,
        ..small_options()
    };
    let mut pager = Pager::open(&path, &lenient).unwrap();
    assert_eq!(pager.read_leaf(pgno).unwrap().data, b"chXcksummed");
}

#[test]
fn test_raw_write_requires_full_page() {
    let (_dir, mut pager) = setup_temp_pager();
    let pgno = pager.allocate().unwrap();
    assert!(pager.write(pgno, &[0u8; 10]).is_err());
    assert!(pager.write(pgno, &[0u8; 256]).is_ok());
}
