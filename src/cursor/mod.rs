//! Cursor Module
//!
//! Executes variable-level operations against the paged file: creating and
//! deleting variables, and reading, writing, inserting and removing bytes at
//! arbitrary offsets of a variable's content.
//!
//! ## Content Tree
//! ```text
//!                 ┌────────────────────────┐
//!                 │ Inner   keys: [40, 90] │   total = 130
//!                 └──┬──────────┬───────┬──┘
//!          0..40     │   40..90 │       │ 90..130
//!               ┌────▼───┐ ┌────▼───┐ ┌─▼──────┐
//!               │ Leaf   │ │ Leaf   │ │ Leaf   │
//!               │ 40 B   │ │ 50 B   │ │ 40 B   │
//!               └────────┘ └────────┘ └────────┘
//! ```
//! Inner nodes are indexed by cumulative byte offset, so an insert in the
//! middle of a variable shifts every later boundary on the path to the root
//! instead of rewriting the leaves after it.
//!
//! ## Statement Rules
//! - Every check (existence, bounds, alignment, type) runs before the first
//!   page is allocated or written
//! - Transient buffers come from the statement's [`LinearAllocator`]
//! - Insert and create allocate every page they need before the first
//!   write, so `OutOfSpace` leaves the variable unchanged
//! - Remove and write never allocate
//! - An I/O error part-way through a cascade can still leave the tree
//!   half-written

mod check;
mod directory;
mod insert;
mod remove;
mod tree;
mod write;

pub use check::TreeStats;
pub use directory::HashDirectory;

use tracing::debug;

use crate::arena::{ArenaSlice, LinearAllocator};
use crate::error::{NumstoreError, Result};
use crate::pager::{LeafPage, Page, Pager, Pgno, VarPage};
use crate::types::Type;

/// Descriptor of one variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarInfo {
    pub name: String,
    pub ty: Type,
    /// Content length in bytes
    pub length: u64,
    /// Root page of the content tree
    pub root: Pgno,
}

impl From<VarPage> for VarInfo {
    fn from(var: VarPage) -> Self {
        Self {
            name: var.name,
            ty: var.ty,
            length: var.length,
            root: var.root,
        }
    }
}

/// Operation surface over one pager and one statement arena
pub struct Cursor<'a> {
    pager: &'a mut Pager,
    arena: &'a mut LinearAllocator,
    max_name_len: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(pager: &'a mut Pager, arena: &'a mut LinearAllocator) -> Self {
        Self {
            pager,
            arena,
            max_name_len: u16::MAX as usize,
        }
    }

    /// Reject names longer than `len` bytes
    pub fn with_max_name_len(mut self, len: usize) -> Self {
        self.max_name_len = len;
        self
    }

    /// Bytes of a region returned by `read` or `remove`
    pub fn bytes(&self, slice: ArenaSlice) -> &[u8] {
        self.arena.bytes(slice)
    }

    // =========================================================================
    // Variables
    // =========================================================================

    /// Create an empty variable of type `ty`
    pub fn create(&mut self, name: &str, ty: Type) -> Result<()> {
        // Step 1: Validate
        if name.len() > self.max_name_len {
            return Err(NumstoreError::NameTooLong {
                len: name.len(),
                max: self.max_name_len,
            });
        }
        let encoded = VarPage::encoded_len(name, &ty)?;
        if encoded > self.pager.page_size() {
            return Err(NumstoreError::NameTooLong {
                len: name.len(),
                max: name.len().saturating_sub(encoded - self.pager.page_size()),
            });
        }
        match ty.checked_byte_size() {
            Some(0) => {
                return Err(NumstoreError::TypeMismatch(format!(
                    "type {} has zero size",
                    ty
                )))
            }
            None => {
                return Err(NumstoreError::TypeMismatch(format!(
                    "type {} is too large to store",
                    ty
                )))
            }
            Some(_) => {}
        }
        if self.directory().lookup(name)?.is_some() {
            return Err(NumstoreError::AlreadyExists(name.to_string()));
        }

        // Step 2: Empty root leaf, then the descriptor pointing at it
        let pages = self.pager.allocate_many(2)?;
        let (root, var_pgno) = (pages[0], pages[1]);
        self.pager.write_page(root, &Page::Leaf(LeafPage::default()))?;
        let var = VarPage::new(name, ty, root);
        self.pager.write_page(var_pgno, &Page::Var(var))?;

        // Step 3: Publish in the directory; give the pages back if it is full
        if let Err(err) = self.directory().insert(name, var_pgno) {
            self.pager.free(var_pgno)?;
            self.pager.free(root)?;
            return Err(err);
        }

        debug!(name, var = var_pgno, root, "created variable");
        Ok(())
    }

    /// Delete a variable and return every page it used to the free list
    pub fn delete(&mut self, name: &str) -> Result<()> {
        let (var_pgno, var) = self.open_var(name)?;

        // Unpublish before freeing; a failure below can only leak pages
        self.directory().remove(name)?;

        let pages = tree::collect_post_order(self.pager, var.root)?;
        for pgno in &pages {
            self.pager.free(*pgno)?;
        }
        self.pager.free(var_pgno)?;

        debug!(name, freed = pages.len() + 1, "deleted variable");
        Ok(())
    }

    /// Descriptor of one variable
    pub fn info(&mut self, name: &str) -> Result<VarInfo> {
        let (_, var) = self.open_var(name)?;
        Ok(var.into())
    }

    /// Descriptors of every variable, ordered by name
    pub fn list(&mut self) -> Result<Vec<VarInfo>> {
        let entries = self.directory().entries()?;
        let mut vars = Vec::with_capacity(entries.len());
        for (_, var_pgno) in entries {
            vars.push(VarInfo::from(self.pager.read_var(var_pgno)?));
        }
        vars.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(vars)
    }

    // =========================================================================
    // Content
    // =========================================================================

    /// Copy up to `len` bytes starting at `offset` into the arena.
    ///
    /// Returns fewer bytes when the range runs past the end of the content.
    pub fn read(&mut self, name: &str, offset: u64, len: u64) -> Result<ArenaSlice> {
        self.read_strided(name, offset, len, 1)
    }

    /// Read every `stride`-th element starting at `offset`.
    ///
    /// ```text
    ///   stride 3:  [e0][  ][  ][e1][  ][  ][e2] ...
    /// ```
    /// `len` bounds the bytes returned. With a stride above 1 the offset
    /// and `len` must be whole elements; a stride of 1 reads plain bytes.
    pub fn read_strided(
        &mut self,
        name: &str,
        offset: u64,
        len: u64,
        stride: u32,
    ) -> Result<ArenaSlice> {
        let (_, var) = self.open_var(name)?;
        check_stride(stride)?;
        if offset > var.length {
            return Err(NumstoreError::OffsetOutOfRange {
                offset,
                length: var.length,
            });
        }

        if stride == 1 {
            let count = len.min(var.length - offset);
            let out = self.arena.allocate(to_usize(count)?, 1)?;
            self.copy_out(var.root, offset, count, out, 0)?;
            return Ok(out);
        }

        check_aligned(&var.ty, "offset", offset)?;
        check_aligned(&var.ty, "length", len)?;
        let size = var.ty.byte_size();
        let step = size.saturating_mul(u64::from(stride));
        let remaining = var.length - offset;
        let available = if remaining < size {
            0
        } else {
            (remaining - size) / step + 1
        };
        let count = (len / size).min(available);

        let out = self.arena.allocate(to_usize(count * size)?, 1)?;
        for k in 0..count {
            self.copy_out(var.root, offset + k * step, size, out, to_usize(k * size)?)?;
        }
        Ok(out)
    }

    /// Copy `count` bytes from `offset` of the tree into `out[at..]`
    fn copy_out(
        &mut self,
        root: Pgno,
        offset: u64,
        count: u64,
        out: ArenaSlice,
        at: usize,
    ) -> Result<()> {
        let mut done = 0u64;
        while done < count {
            let descent = tree::descend(self.pager, root, offset + done)?;
            let rel = descent.rel as usize;
            let take = ((count - done) as usize).min(descent.leaf.data.len().saturating_sub(rel));
            if take == 0 {
                return Err(NumstoreError::corrupt(
                    descent.leaf_pgno,
                    "leaf shorter than its parent records",
                ));
            }

            let dst = at + done as usize;
            self.arena.bytes_mut(out)[dst..dst + take]
                .copy_from_slice(&descent.leaf.data[rel..rel + take]);
            done += take as u64;
        }
        Ok(())
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn directory(&mut self) -> HashDirectory<'_> {
        HashDirectory::new(self.pager)
    }

    /// Resolve a name to its var page
    fn open_var(&mut self, name: &str) -> Result<(Pgno, VarPage)> {
        let var_pgno = self
            .directory()
            .lookup(name)?
            .ok_or_else(|| NumstoreError::NotFound(name.to_string()))?;
        let var = self.pager.read_var(var_pgno)?;
        Ok((var_pgno, var))
    }
}

/// Offsets and lengths into content must be whole elements
fn check_aligned(ty: &Type, what: &str, value: u64) -> Result<()> {
    let size = ty.byte_size();
    if size == 0 || value % size != 0 {
        return Err(NumstoreError::TypeMismatch(format!(
            "{} {} is not a multiple of the {} element size {}",
            what, value, ty, size
        )));
    }
    Ok(())
}

fn check_stride(stride: u32) -> Result<()> {
    if stride == 0 {
        return Err(NumstoreError::InvalidArgument(
            "stride must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn to_usize(len: u64) -> Result<usize> {
    usize::try_from(len)
        .map_err(|_| NumstoreError::OutOfMemory(format!("{} bytes exceed the address space", len)))
}
