//! Pager Module
//!
//! Owns the database file: fixed-size page I/O, page allocation through an
//! on-disk free list, and the superblock that records both.
//!
//! ## File Layout
//! ```text
//! ┌──────────────────┬──────────────┬─────────┬─────────┬─────
//! │ Page 0           │ Page 1       │ Page 2  │ Page 3  │ ...
//! │ Superblock       │ Root hash    │ any     │ any     │
//! └──────────────────┴──────────────┴─────────┴─────────┴─────
//! ```
//! Page `n` lives at byte offset `n * page_size`. Page 0 is never handed
//! out, so `0` doubles as the NIL page number.
//!
//! ## Free List
//! Freed pages are rewritten as [`FreePage`]s and pushed onto a singly
//! linked stack whose head and length live in the superblock. `allocate`
//! pops before it extends the file; the file never shrinks.
//!
//! Every superblock change is written back immediately. Page-write order is
//! the only durability guarantee; `sync` is left to the caller.

pub mod hash_page;
pub mod inner_node;
pub mod page;
pub mod superblock;
pub mod var_page;

pub use hash_page::{hash_name, Full, HashPage, Probe, Slot};
pub use inner_node::InnerNode;
pub use page::{FreePage, LeafPage, Page, PageBuf, PageKind};
pub use superblock::Superblock;
pub use var_page::VarPage;

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::config::{Config, MAX_PAGE_SIZE, MIN_PAGE_SIZE};
use crate::error::{NumstoreError, Result};
use hash_page::{HASH_HEADER_SIZE, HASH_SLOT_SIZE};
use inner_node::{INNER_ENTRY_SIZE, INNER_HEADER_SIZE};
use page::LEAF_HEADER_SIZE;
use superblock::SUPERBLOCK_SIZE;

/// Page number
pub type Pgno = u32;

/// "No page"; page 0 holds the superblock and is never allocated
pub const NIL: Pgno = 0;

// =============================================================================
// Page Layout
// =============================================================================

/// Per-file capacities derived from the page size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLayout {
    page_size: usize,
    hash_capacity: usize,
    inner_capacity: usize,
    leaf_capacity: usize,
}

impl PageLayout {
    pub fn new(page_size: usize) -> Result<Self> {
        if !page_size.is_power_of_two() || !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(NumstoreError::Config(format!(
                "page_size must be a power of two in {}..={}, got {}",
                MIN_PAGE_SIZE, MAX_PAGE_SIZE, page_size
            )));
        }

        Ok(Self {
            page_size,
            hash_capacity: (page_size - HASH_HEADER_SIZE) / HASH_SLOT_SIZE,
            // keys take 8 bytes each, children 4 bytes each plus one extra child
            inner_capacity: (page_size - INNER_HEADER_SIZE - 4) / INNER_ENTRY_SIZE,
            leaf_capacity: page_size - LEAF_HEADER_SIZE,
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Slots per hash page
    pub fn hash_capacity(&self) -> usize {
        self.hash_capacity
    }

    /// Keys per inner node
    pub fn inner_capacity(&self) -> usize {
        self.inner_capacity
    }

    /// Data bytes per leaf
    pub fn leaf_capacity(&self) -> usize {
        self.leaf_capacity
    }
}

// =============================================================================
// Options
// =============================================================================

/// Pager settings, normally derived from [`Config`]
#[derive(Debug, Clone)]
pub struct PagerOptions {
    /// Page size used when formatting a new file
    pub page_size: usize,
    /// Maximum pages in the file (None = unbounded)
    pub max_pages: Option<u32>,
    /// Verify checksums on typed reads
    pub verify_checksums: bool,
}

impl Default for PagerOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for PagerOptions {
    fn from(config: &Config) -> Self {
        Self {
            page_size: config.page_size,
            max_pages: config.max_pages,
            verify_checksums: config.verify_checksums,
        }
    }
}

// =============================================================================
// Pager
// =============================================================================

/// Paged file with a persistent free list
pub struct Pager {
    file: File,
    path: PathBuf,
    layout: PageLayout,
    superblock: Superblock,
    options: PagerOptions,
}

impl Pager {
    /// Open an existing database file or format a new one
    pub fn open(path: impl AsRef<Path>, options: &PagerOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if file.metadata()?.len() == 0 {
            Self::format(file, path, options)
        } else {
            Self::load(file, path, options)
        }
    }

    fn format(file: File, path: PathBuf, options: &PagerOptions) -> Result<Self> {
        let layout = PageLayout::new(options.page_size)?;
        let mut pager = Self {
            file,
            path,
            layout,
            superblock: Superblock::new(options.page_size as u32),
            options: options.clone(),
        };

        // Step 1: Page 0 holds the superblock followed by zeros
        let mut first = vec![0u8; layout.page_size()];
        first[..SUPERBLOCK_SIZE].copy_from_slice(&pager.superblock.encode());
        pager.write(NIL, &first)?;

        // Step 2: The directory head always lives at a fixed page
        let root = pager.allocate()?;
        pager.write_page(root, &Page::Hash(HashPage::empty(&layout)))?;
        pager.superblock.root_hash = root;
        pager.write_superblock()?;

        debug!(
            path = %pager.path.display(),
            page_size = layout.page_size(),
            root_hash = root,
            "formatted new database file"
        );
        Ok(pager)
    }

    fn load(mut file: File, path: PathBuf, options: &PagerOptions) -> Result<Self> {
        let mut header = [0u8; SUPERBLOCK_SIZE];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut header)?;
        let superblock = Superblock::decode(&header)?;

        let layout = PageLayout::new(superblock.page_size as usize).map_err(|_| {
            NumstoreError::corrupt(
                NIL,
                format!("superblock records invalid page size {}", superblock.page_size),
            )
        })?;

        let needed = superblock.page_count as u64 * layout.page_size() as u64;
        let actual = file.metadata()?.len();
        if actual < needed {
            return Err(NumstoreError::corrupt(
                NIL,
                format!(
                    "file is {} bytes but superblock records {} pages ({} bytes)",
                    actual, superblock.page_count, needed
                ),
            ));
        }

        if superblock.root_hash == NIL || superblock.root_hash >= superblock.page_count {
            return Err(NumstoreError::corrupt(
                NIL,
                format!("root hash page {} out of range", superblock.root_hash),
            ));
        }

        if options.page_size != layout.page_size() {
            debug!(
                configured = options.page_size,
                on_disk = layout.page_size(),
                "existing file keeps its page size"
            );
        }

        debug!(
            path = %path.display(),
            page_count = superblock.page_count,
            free_count = superblock.free_count,
            "opened database file"
        );

        Ok(Self {
            file,
            path,
            layout,
            superblock,
            options: options.clone(),
        })
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    /// Hand out a zeroed page, reusing the free list before growing the file
    pub fn allocate(&mut self) -> Result<Pgno> {
        let pgno = if self.superblock.free_head != NIL {
            let pgno = self.superblock.free_head;
            let next = match self.read_page(pgno)? {
                Page::Free(free) => free.next,
                other => {
                    return Err(NumstoreError::InvalidPageType {
                        pgno,
                        expected: PageKind::Free,
                        found: other.kind(),
                    })
                }
            };
            self.superblock.free_head = next;
            self.superblock.free_count = self.superblock.free_count.saturating_sub(1);
            trace!(pgno, next, "allocate from free list");
            pgno
        } else {
            let pgno = self.superblock.page_count;
            if let Some(max) = self.options.max_pages {
                if pgno >= max {
                    return Err(NumstoreError::OutOfSpace(format!(
                        "file is at its limit of {} pages",
                        max
                    )));
                }
            }
            if pgno == Pgno::MAX {
                return Err(NumstoreError::OutOfSpace(
                    "page number space exhausted".to_string(),
                ));
            }
            self.superblock.page_count += 1;
            trace!(pgno, "allocate by extending file");
            pgno
        };

        let zeros = vec![0u8; self.layout.page_size()];
        self.write(pgno, &zeros)?;
        self.write_superblock()?;
        Ok(pgno)
    }

    /// Allocate `count` pages or none.
    ///
    /// On failure the pages already taken go back in reverse order, which
    /// restores the free list to its previous order.
    pub fn allocate_many(&mut self, count: usize) -> Result<Vec<Pgno>> {
        let mut pages = Vec::with_capacity(count);
        for _ in 0..count {
            match self.allocate() {
                Ok(pgno) => pages.push(pgno),
                Err(err) => {
                    for &pgno in pages.iter().rev() {
                        self.free(pgno)?;
                    }
                    return Err(err);
                }
            }
        }
        Ok(pages)
    }

    /// Return a page to the free list
    pub fn free(&mut self, pgno: Pgno) -> Result<()> {
        if pgno == NIL || pgno >= self.superblock.page_count {
            return Err(NumstoreError::corrupt(
                pgno,
                format!(
                    "cannot free page outside 1..{}",
                    self.superblock.page_count
                ),
            ));
        }

        let raw = self.read(pgno)?;
        if page::raw_kind(&raw) == Some(PageKind::Free) {
            return Err(NumstoreError::corrupt(pgno, "page is already free"));
        }

        let free = FreePage {
            next: self.superblock.free_head,
        };
        self.write_page(pgno, &Page::Free(free))?;
        self.superblock.free_head = pgno;
        self.superblock.free_count += 1;
        self.write_superblock()?;

        trace!(pgno, free_count = self.superblock.free_count, "freed page");
        Ok(())
    }

    // =========================================================================
    // Raw I/O
    // =========================================================================

    /// Read the raw bytes of a page
    pub fn read(&mut self, pgno: Pgno) -> Result<PageBuf> {
        self.check_range(pgno)?;
        let mut buf = vec![0u8; self.layout.page_size()];
        self.file.seek(SeekFrom::Start(self.offset_of(pgno)))?;
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Overwrite a page with raw bytes
    pub fn write(&mut self, pgno: Pgno, buf: &[u8]) -> Result<()> {
        self.check_range(pgno)?;
        if buf.len() != self.layout.page_size() {
            return Err(NumstoreError::corrupt(
                pgno,
                format!(
                    "write of {} bytes, page size is {}",
                    buf.len(),
                    self.layout.page_size()
                ),
            ));
        }
        self.file.seek(SeekFrom::Start(self.offset_of(pgno)))?;
        self.file.write_all(buf)?;
        Ok(())
    }

    // =========================================================================
    // Typed I/O
    // =========================================================================

    /// Read and decode a page
    pub fn read_page(&mut self, pgno: Pgno) -> Result<Page> {
        if pgno == NIL {
            return Err(NumstoreError::corrupt(pgno, "page 0 holds the superblock"));
        }
        let buf = self.read(pgno)?;
        Page::decode(pgno, &buf, &self.layout, self.options.verify_checksums)
    }

    /// Encode, seal and write a page
    pub fn write_page(&mut self, pgno: Pgno, page: &Page) -> Result<()> {
        if pgno == NIL {
            return Err(NumstoreError::corrupt(pgno, "page 0 holds the superblock"));
        }
        let buf = page.encode(pgno, &self.layout)?;
        trace!(pgno, kind = ?page.kind(), "write page");
        self.write(pgno, &buf)
    }

    pub fn read_hash(&mut self, pgno: Pgno) -> Result<HashPage> {
        match self.read_page(pgno)? {
            Page::Hash(page) => Ok(page),
            other => Err(wrong_kind(pgno, PageKind::Hash, &other)),
        }
    }

    pub fn read_var(&mut self, pgno: Pgno) -> Result<VarPage> {
        match self.read_page(pgno)? {
            Page::Var(page) => Ok(page),
            other => Err(wrong_kind(pgno, PageKind::Var, &other)),
        }
    }

    pub fn read_inner(&mut self, pgno: Pgno) -> Result<InnerNode> {
        match self.read_page(pgno)? {
            Page::Inner(node) => Ok(node),
            other => Err(wrong_kind(pgno, PageKind::Inner, &other)),
        }
    }

    pub fn read_leaf(&mut self, pgno: Pgno) -> Result<LeafPage> {
        match self.read_page(pgno)? {
            Page::Leaf(leaf) => Ok(leaf),
            other => Err(wrong_kind(pgno, PageKind::Leaf, &other)),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    pub fn page_size(&self) -> usize {
        self.layout.page_size()
    }

    /// Pages in the file, superblock included
    pub fn page_count(&self) -> u32 {
        self.superblock.page_count
    }

    /// Pages currently on the free list
    pub fn free_list_len(&self) -> u32 {
        self.superblock.free_count
    }

    /// Head of the variable hash directory
    pub fn root_hash(&self) -> Pgno {
        self.superblock.root_hash
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Walk the free list from its head
    pub fn free_list(&mut self) -> Result<Vec<Pgno>> {
        let mut pages = Vec::with_capacity(self.superblock.free_count as usize);
        let mut seen = HashSet::new();
        let mut current = self.superblock.free_head;

        while current != NIL {
            if !seen.insert(current) {
                return Err(NumstoreError::corrupt(current, "cycle in free list"));
            }
            pages.push(current);
            current = match self.read_page(current)? {
                Page::Free(free) => free.next,
                other => return Err(wrong_kind(current, PageKind::Free, &other)),
            };
        }

        Ok(pages)
    }

    /// Flush file contents and metadata to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn write_superblock(&mut self) -> Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&self.superblock.encode())?;
        Ok(())
    }

    fn check_range(&self, pgno: Pgno) -> Result<()> {
        if pgno >= self.superblock.page_count {
            return Err(NumstoreError::corrupt(
                pgno,
                format!("page beyond end of file ({} pages)", self.superblock.page_count),
            ));
        }
        Ok(())
    }

    fn offset_of(&self, pgno: Pgno) -> u64 {
        pgno as u64 * self.layout.page_size() as u64
    }
}

impl std::fmt::Debug for Pager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pager")
            .field("path", &self.path)
            .field("layout", &self.layout)
            .field("superblock", &self.superblock)
            .finish()
    }
}

fn wrong_kind(pgno: Pgno, expected: PageKind, found: &Page) -> NumstoreError {
    NumstoreError::InvalidPageType {
        pgno,
        expected,
        found: found.kind(),
    }
}
