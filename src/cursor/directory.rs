//! Hash Directory
//!
//! Name → var page mapping spread over a chain of hash pages that starts at
//! the superblock's `root_hash`.
//!
//! ```text
//!  root_hash
//!     │
//!     ▼
//! ┌──────────┐ next ┌──────────┐ next ┌──────────┐
//! │ HashPage │─────▶│ HashPage │─────▶│ HashPage │──▶ NIL
//! └────┬─────┘      └──────────┘      └──────────┘
//!      │ slot
//!      ▼
//! ┌──────────┐
//! │ VarPage  │  name, type, length, root
//! └──────────┘
//! ```
//!
//! A name lives in the first page of the chain that had a free slot on its
//! probe path when it was inserted. The head page is never freed; overflow
//! pages are unlinked and freed once their last entry is removed.

use tracing::debug;

use crate::error::{NumstoreError, Result};
use crate::pager::{hash_name, HashPage, Page, Pager, Pgno, Probe, NIL};

/// Where a name was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Location {
    page: Pgno,
    slot: usize,
    var: Pgno,
}

/// Hash-page chain operations over a pager
pub struct HashDirectory<'p> {
    pager: &'p mut Pager,
}

impl<'p> HashDirectory<'p> {
    pub fn new(pager: &'p mut Pager) -> Self {
        Self { pager }
    }

    /// Var page of `name`, if present
    pub fn lookup(&mut self, name: &str) -> Result<Option<Pgno>> {
        Ok(self.find(name)?.map(|loc| loc.var))
    }

    /// Map `name` to `var`, growing the chain when every page is full
    pub fn insert(&mut self, name: &str, var: Pgno) -> Result<()> {
        if self.find(name)?.is_some() {
            return Err(NumstoreError::AlreadyExists(name.to_string()));
        }

        let hash = hash_name(name);
        let mut current = self.pager.root_hash();
        let mut tail = current;

        while current != NIL {
            let mut page = self.pager.read_hash(current)?;
            if page.insert(hash, var).is_ok() {
                return self.pager.write_page(current, &Page::Hash(page));
            }
            tail = current;
            current = page.next;
        }

        // Every page is full: chain a new overflow page after the tail
        let overflow = self.pager.allocate()?;
        let mut page = HashPage::empty(self.pager.layout());
        page.insert(hash, var)
            .map_err(|_| NumstoreError::corrupt(overflow, "fresh hash page has no free slot"))?;
        self.pager.write_page(overflow, &Page::Hash(page))?;

        let mut last = self.pager.read_hash(tail)?;
        last.next = overflow;
        self.pager.write_page(tail, &Page::Hash(last))?;

        debug!(after = tail, overflow, "chained hash overflow page");
        Ok(())
    }

    /// Drop `name`, returning the var page it pointed at
    pub fn remove(&mut self, name: &str) -> Result<Pgno> {
        let loc = self
            .find(name)?
            .ok_or_else(|| NumstoreError::NotFound(name.to_string()))?;

        let mut page = self.pager.read_hash(loc.page)?;
        page.remove(loc.slot);

        if page.is_empty() && loc.page != self.pager.root_hash() {
            self.unlink(loc.page, page.next)?;
            self.pager.free(loc.page)?;
            debug!(pgno = loc.page, "freed empty hash overflow page");
        } else {
            self.pager.write_page(loc.page, &Page::Hash(page))?;
        }

        Ok(loc.var)
    }

    /// Every live `(hash, var)` entry across the chain
    pub fn entries(&mut self) -> Result<Vec<(u32, Pgno)>> {
        let mut entries = Vec::new();
        for pgno in self.chain()? {
            entries.extend(self.pager.read_hash(pgno)?.entries());
        }
        Ok(entries)
    }

    /// Page numbers of the chain, head first
    pub fn chain(&mut self) -> Result<Vec<Pgno>> {
        let mut pages = Vec::new();
        let mut current = self.pager.root_hash();
        while current != NIL {
            if pages.contains(&current) {
                return Err(NumstoreError::corrupt(current, "cycle in hash page chain"));
            }
            pages.push(current);
            current = self.pager.read_hash(current)?.next;
        }
        Ok(pages)
    }

    fn find(&mut self, name: &str) -> Result<Option<Location>> {
        let hash = hash_name(name);
        let mut current = self.pager.root_hash();
        let mut visited = 0u32;

        while current != NIL {
            visited += 1;
            if visited > self.pager.page_count() {
                return Err(NumstoreError::corrupt(current, "cycle in hash page chain"));
            }

            let page = self.pager.read_hash(current)?;
            let pager = &mut *self.pager;
            let probe = page.lookup(hash, |var| Ok(pager.read_var(var)?.name == name))?;

            match probe {
                Probe::Found { slot, pgno } => {
                    return Ok(Some(Location {
                        page: current,
                        slot,
                        var: pgno,
                    }))
                }
                Probe::Absent => return Ok(None),
                Probe::Exhausted => current = page.next,
            }
        }

        Ok(None)
    }

    /// Point `target`'s predecessor at `next`
    fn unlink(&mut self, target: Pgno, next: Pgno) -> Result<()> {
        let mut prev = self.pager.root_hash();
        while prev != NIL {
            let mut page = self.pager.read_hash(prev)?;
            if page.next == target {
                page.next = next;
                return self.pager.write_page(prev, &Page::Hash(page));
            }
            prev = page.next;
        }
        Err(NumstoreError::corrupt(target, "hash page missing from its chain"))
    }
}
