//! VM Module
//!
//! Statement dispatcher between parsed queries and the cursor.
//!
//! ## Statement Lifecycle
//! ```text
//!   Idle ──execute──▶ Dispatching ──ok──▶ Done
//!                         │
//!                         └──err──▶ Failed
//! ```
//! Every statement gets a fresh view of the same linear allocator; whatever
//! it allocated is released when the statement ends, success or not.

use tracing::{debug, warn};

use crate::arena::LinearAllocator;
use crate::config::Config;
use crate::cursor::Cursor;
use crate::error::{ErrorClass, Result};
use crate::pager::Pager;
use crate::query::Query;

/// Where the VM is in its statement lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    Idle,
    Dispatching,
    Done,
    Failed,
}

/// Single-statement executor
#[derive(Debug)]
pub struct Vm {
    arena: LinearAllocator,
    max_name_len: usize,
    state: VmState,
}

impl Vm {
    /// VM with an arena of `arena_capacity` bytes
    pub fn new(arena_capacity: usize) -> Self {
        Self {
            arena: LinearAllocator::new(arena_capacity),
            max_name_len: u16::MAX as usize,
            state: VmState::Idle,
        }
    }

    /// VM sized and limited by `config`
    pub fn from_config(config: &Config) -> Self {
        let mut vm = Self::new(config.arena_capacity());
        vm.max_name_len = config.max_name_len;
        vm
    }

    /// Terminal state of the last statement (`Idle` before the first)
    pub fn state(&self) -> VmState {
        self.state
    }

    pub fn arena(&self) -> &LinearAllocator {
        &self.arena
    }

    /// Run one statement to completion.
    ///
    /// Returns the bytes produced by `Read` and `Remove`, `None` otherwise.
    pub fn execute(&mut self, query: Query, pager: &mut Pager) -> Result<Option<Vec<u8>>> {
        self.state = VmState::Dispatching;
        let kind = query.kind();
        debug!(?kind, name = query.name(), statement = %query, "dispatch");

        let checkpoint = self.arena.checkpoint();
        let result = self.dispatch(&query, pager);
        self.arena.reset_to(checkpoint);

        match &result {
            Ok(_) => self.state = VmState::Done,
            Err(e) => {
                self.state = VmState::Failed;
                if e.class() == ErrorClass::Structural {
                    warn!(
                        ?kind,
                        mutation = kind.is_mutation(),
                        statement = %query,
                        error = %e,
                        "statement failed"
                    );
                } else {
                    debug!(?kind, statement = %query, error = %e, "statement rejected");
                }
            }
        }

        result
    }

    /// Run `f` against a cursor outside the query path (inspection).
    ///
    /// The arena is reset afterwards, like for any statement.
    pub fn with_cursor<T, F>(&mut self, pager: &mut Pager, f: F) -> Result<T>
    where
        F: FnOnce(&mut Cursor<'_>) -> Result<T>,
    {
        let checkpoint = self.arena.checkpoint();
        let result = {
            let mut cursor = Cursor::new(pager, &mut self.arena).with_max_name_len(self.max_name_len);
            f(&mut cursor)
        };
        self.arena.reset_to(checkpoint);
        result
    }

    fn dispatch(&mut self, query: &Query, pager: &mut Pager) -> Result<Option<Vec<u8>>> {
        let mut cursor = Cursor::new(pager, &mut self.arena).with_max_name_len(self.max_name_len);

        match query {
            Query::Create { name, ty } => {
                cursor.create(name, ty.clone())?;
                Ok(None)
            }
            Query::Delete { name } => {
                cursor.delete(name)?;
                Ok(None)
            }
            Query::Insert {
                name,
                value,
                offset,
            } => {
                cursor.insert(name, value, *offset)?;
                Ok(None)
            }
            Query::Append { name, value } => {
                cursor.append(name, value)?;
                Ok(None)
            }
            Query::Write {
                name,
                value,
                offset,
            } => {
                cursor.write(name, value, *offset)?;
                Ok(None)
            }
            Query::Read {
                name,
                offset,
                len,
                stride,
            } => {
                let slice = cursor.read_strided(name, *offset, *len, *stride)?;
                Ok(Some(cursor.bytes(slice).to_vec()))
            }
            Query::Remove {
                name,
                offset,
                len,
                stride,
            } => {
                let slice = cursor.remove_strided(name, *offset, *len, *stride)?;
                Ok(Some(cursor.bytes(slice).to_vec()))
            }
        }
    }
}
