//! In-place overwrite.
//!
//! The bytes under `offset..offset + len` are replaced leaf by leaf. No
//! boundary moves and no page is allocated, so the tree shape is untouched.

use tracing::debug;

use super::tree::{self, Descent};
use super::{check_aligned, Cursor};
use crate::error::{NumstoreError, Result};
use crate::pager::Page;
use crate::types::Value;

impl<'a> Cursor<'a> {
    /// Overwrite the content of `name` at byte `offset` with `value`
    pub fn write(&mut self, name: &str, value: &Value, offset: u64) -> Result<()> {
        // Step 1: Validate before touching any page
        let (_, var) = self.open_var(name)?;
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
        let len = value.serialized_len();
        let fits = offset
            .checked_add(len as u64)
            .is_some_and(|end| end <= var.length);
        if !fits {
            return Err(NumstoreError::OffsetOutOfRange {
                offset: offset.saturating_add(len as u64),
                length: var.length,
            });
        }

        // Step 2: Serialize into the arena
        let bytes = self.arena.allocate(len, 1)?;
        value.serialize_into(self.arena.bytes_mut(bytes));

        // Step 3: Copy over each leaf in turn
        let mut done = 0usize;
        let mut leaves = 0usize;
        while done < len {
            let Descent {
                leaf_pgno,
                mut leaf,
                rel,
                ..
            } = tree::descend(self.pager, var.root, offset + done as u64)?;
            let rel = rel as usize;
            let take = (len - done).min(leaf.data.len().saturating_sub(rel));
            if take == 0 {
                return Err(NumstoreError::corrupt(
                    leaf_pgno,
                    "leaf shorter than its parent records",
                ));
            }

            leaf.data[rel..rel + take].copy_from_slice(&self.arena.bytes(bytes)[done..done + take]);
            self.pager.write_page(leaf_pgno, &Page::Leaf(leaf))?;
            done += take;
            leaves += 1;
        }

        debug!(name, offset, len, leaves, "overwrote content");
        Ok(())
    }
}
