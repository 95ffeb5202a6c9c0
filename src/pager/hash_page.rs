//! Hash Page
//!
//! Page-resident open-addressing table mapping the hash of a variable name
//! to the page number of that variable's descriptor (var page). Pages are
//! chained through `next` when every slot of a page is taken.
//!
//! ## Layout
//! ```text
//! ┌────────────┬──────────┬──────────┬─────────────────────────────┐
//! │ Header (8) │ Next (4) │ Live (4) │ Slots: [Hash (4)][Pgno (4)] │
//! └────────────┴──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! Slot states are encoded in the pgno field: `0` is Empty, `u32::MAX` is a
//! Tombstone, anything else is Occupied. Slots never return to Empty once
//! used, which is what lets a probe stop at the first Empty slot.

use bytes::{Buf, BufMut};

use super::page::COMMON_HEADER_SIZE;
use super::{PageLayout, Pgno, NIL};
use crate::error::{NumstoreError, Result};

/// Hash page header: common + next (4) + live (4)
pub const HASH_HEADER_SIZE: usize = COMMON_HEADER_SIZE + 8;

/// One slot: hash (4) + pgno (4)
pub const HASH_SLOT_SIZE: usize = 8;

const TOMBSTONE: Pgno = u32::MAX;

/// Hash used for directory placement
pub fn hash_name(name: &str) -> u32 {
    crc32fast::hash(name.as_bytes())
}

/// State of one directory slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Empty,
    Tombstone,
    Occupied { hash: u32, pgno: Pgno },
}

/// Outcome of probing one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// Name found in `slot`, pointing at `pgno`
    Found { slot: usize, pgno: Pgno },
    /// Probe reached an Empty slot: the name is not in this chain
    Absent,
    /// Every slot was probed without a match: continue with `next`
    Exhausted,
}

/// Every slot on the probe path is taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Full;

/// Decoded hash page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashPage {
    /// Overflow page (NIL = end of chain)
    pub next: Pgno,
    live: u32,
    slots: Vec<Slot>,
}

impl HashPage {
    /// Fresh page with every slot Empty
    pub fn empty(layout: &PageLayout) -> Self {
        Self {
            next: NIL,
            live: 0,
            slots: vec![Slot::Empty; layout.hash_capacity()],
        }
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots
    pub fn live(&self) -> u32 {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn slot(&self, index: usize) -> Slot {
        self.slots[index]
    }

    /// Slot indices in probe order for `hash`: `hash % capacity`, then
    /// forward with wrap-around, visiting each slot once.
    pub fn probe(&self, hash: u32) -> impl Iterator<Item = usize> {
        let capacity = self.slots.len();
        let start = hash as usize % capacity;
        (0..capacity).map(move |i| (start + i) % capacity)
    }

    /// Probe for `hash`; `matches` confirms a candidate pgno belongs to the
    /// name being looked up (hashes alone may collide).
    pub fn lookup<F>(&self, hash: u32, mut matches: F) -> Result<Probe>
    where
        F: FnMut(Pgno) -> Result<bool>,
    {
        for index in self.probe(hash) {
            match self.slots[index] {
                Slot::Empty => return Ok(Probe::Absent),
                Slot::Tombstone => continue,
                Slot::Occupied { hash: h, pgno } => {
                    if h == hash && matches(pgno)? {
                        return Ok(Probe::Found { slot: index, pgno });
                    }
                }
            }
        }
        Ok(Probe::Exhausted)
    }

    /// Place `(hash, pgno)` in the first Empty or Tombstone slot on the
    /// probe path. Duplicate detection is the caller's job.
    pub fn insert(&mut self, hash: u32, pgno: Pgno) -> std::result::Result<usize, Full> {
        let target = self
            .probe(hash)
            .find(|&i| !matches!(self.slots[i], Slot::Occupied { .. }));

        match target {
            Some(index) => {
                self.slots[index] = Slot::Occupied { hash, pgno };
                self.live += 1;
                Ok(index)
            }
            None => Err(Full),
        }
    }

    /// Tombstone `slot`, returning the pgno it held
    pub fn remove(&mut self, slot: usize) -> Option<Pgno> {
        match self.slots[slot] {
            Slot::Occupied { pgno, .. } => {
                self.slots[slot] = Slot::Tombstone;
                self.live -= 1;
                Some(pgno)
            }
            _ => None,
        }
    }

    /// Live `(hash, pgno)` pairs in slot order
    pub fn entries(&self) -> impl Iterator<Item = (u32, Pgno)> + '_ {
        self.slots.iter().filter_map(|slot| match *slot {
            Slot::Occupied { hash, pgno } => Some((hash, pgno)),
            _ => None,
        })
    }

    pub(super) fn decode(pgno: Pgno, buf: &[u8], layout: &PageLayout) -> Result<Self> {
        let mut src = &buf[COMMON_HEADER_SIZE..];
        let next = src.get_u32_le();
        let live = src.get_u32_le();

        let mut slots = Vec::with_capacity(layout.hash_capacity());
        let mut occupied = 0u32;
        for _ in 0..layout.hash_capacity() {
            let hash = src.get_u32_le();
            let target = src.get_u32_le();
            let slot = match target {
                NIL => Slot::Empty,
                TOMBSTONE => Slot::Tombstone,
                _ => {
                    occupied += 1;
                    Slot::Occupied {
                        hash,
                        pgno: target,
                    }
                }
            };
            slots.push(slot);
        }

        if occupied != live {
            return Err(NumstoreError::corrupt(
                pgno,
                format!("hash page live count {} but {} slots occupied", live, occupied),
            ));
        }

        Ok(Self { next, live, slots })
    }

    pub(super) fn encode_into(&self, pgno: Pgno, buf: &mut [u8], layout: &PageLayout) -> Result<()> {
        if self.slots.len() != layout.hash_capacity() {
            return Err(NumstoreError::corrupt(
                pgno,
                format!(
                    "hash page has {} slots, layout expects {}",
                    self.slots.len(),
                    layout.hash_capacity()
                ),
            ));
        }

        let mut out = &mut buf[COMMON_HEADER_SIZE..];
        out.put_u32_le(self.next);
        out.put_u32_le(self.live);
        for slot in &self.slots {
            let (hash, target) = match *slot {
                Slot::Empty => (0, NIL),
                Slot::Tombstone => (0, TOMBSTONE),
                Slot::Occupied { hash, pgno } => (hash, pgno),
            };
            out.put_u32_le(hash);
            out.put_u32_le(target);
        }
        Ok(())
    }
}
