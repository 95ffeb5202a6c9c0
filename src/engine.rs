//! Engine Module
//!
//! Owns one database file and runs statements against it.
//!
//! ## Responsibilities
//! - Open or format the paged file described by a [`Config`]
//! - Serialize statements: exactly one runs against the pager at a time
//! - Sync the file according to the configured [`SyncStrategy`]
//! - Expose typed convenience wrappers around [`Query`]

use std::path::Path;

use parking_lot::Mutex;
use tracing::debug;

use crate::config::{Config, SyncStrategy};
use crate::cursor::{Cursor, TreeStats, VarInfo};
use crate::error::Result;
use crate::pager::{Pager, PagerOptions};
use crate::query::Query;
use crate::types::{Type, Value};
use crate::vm::Vm;

/// The storage engine
///
/// ## Concurrency Model: Single Writer
///
/// Every statement, reads included, holds `vm` then `pager` for its whole
/// duration. Reads move the file cursor and share the statement arena, so
/// there is no separate read path. Always lock in that order.
pub struct Engine {
    /// Engine configuration (page size reflects the opened file)
    config: Config,

    /// Statement executor and its arena
    vm: Mutex<Vm>,

    /// The paged database file
    pager: Mutex<Pager>,
}

impl Engine {
    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Validate the config
    /// 2. Open the file, formatting it if empty
    /// 3. Size the statement arena for the file's actual page size
    pub fn open(mut config: Config) -> Result<Self> {
        // Step 1: Reject unusable settings before touching the file
        config.validate()?;

        // Step 2: Open/format the file
        let pager = Pager::open(&config.path, &PagerOptions::from(&config))?;

        // Step 3: An existing file keeps its page size
        config.page_size = pager.page_size();
        let vm = Vm::from_config(&config);

        debug!(
            path = %config.path.display(),
            page_size = config.page_size,
            arena = config.arena_capacity(),
            "engine opened"
        );

        Ok(Self {
            config,
            vm: Mutex::new(vm),
            pager: Mutex::new(pager),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified database file
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().path(path).build();
        Self::open(config)
    }

    /// Execute a query
    pub fn execute(&self, query: Query) -> Result<Option<Vec<u8>>> {
        let mut vm = self.vm.lock();
        let mut pager = self.pager.lock();

        let output = vm.execute(query, &mut pager)?;
        if self.config.sync_strategy == SyncStrategy::EveryStatement {
            pager.sync()?;
        }
        Ok(output)
    }

    // =========================================================================
    // Statements
    // =========================================================================

    /// Create an empty variable
    pub fn create(&self, name: &str, ty: Type) -> Result<()> {
        self.execute(Query::Create {
            name: name.to_string(),
            ty,
        })?;
        Ok(())
    }

    /// Delete a variable
    pub fn delete(&self, name: &str) -> Result<()> {
        self.execute(Query::Delete {
            name: name.to_string(),
        })?;
        Ok(())
    }

    /// Insert `value` at byte `offset`
    pub fn insert(&self, name: &str, value: Value, offset: u64) -> Result<()> {
        self.execute(Query::Insert {
            name: name.to_string(),
            value,
            offset,
        })?;
        Ok(())
    }

    /// Append `value`
    pub fn append(&self, name: &str, value: Value) -> Result<()> {
        self.execute(Query::Append {
            name: name.to_string(),
            value,
        })?;
        Ok(())
    }

    /// Overwrite existing content at byte `offset` with `value`
    pub fn write(&self, name: &str, value: Value, offset: u64) -> Result<()> {
        self.execute(Query::Write {
            name: name.to_string(),
            value,
            offset,
        })?;
        Ok(())
    }

    /// Read up to `len` bytes starting at byte `offset`
    pub fn read(&self, name: &str, offset: u64, len: u64) -> Result<Vec<u8>> {
        let bytes = self.execute(Query::read(name, offset, len))?;
        Ok(bytes.unwrap_or_default())
    }

    /// Read every `stride`-th element from `offset`, up to `len` bytes
    pub fn read_strided(&self, name: &str, offset: u64, len: u64, stride: u32) -> Result<Vec<u8>> {
        let bytes = self.execute(Query::Read {
            name: name.to_string(),
            offset,
            len,
            stride,
        })?;
        Ok(bytes.unwrap_or_default())
    }

    /// Remove `len` bytes at byte `offset`, returning them
    pub fn remove(&self, name: &str, offset: u64, len: u64) -> Result<Vec<u8>> {
        let bytes = self.execute(Query::remove(name, offset, len))?;
        Ok(bytes.unwrap_or_default())
    }

    /// Remove every `stride`-th element from `offset`, `len` bytes in all
    pub fn remove_strided(&self, name: &str, offset: u64, len: u64, stride: u32) -> Result<Vec<u8>> {
        let bytes = self.execute(Query::Remove {
            name: name.to_string(),
            offset,
            len,
            stride,
        })?;
        Ok(bytes.unwrap_or_default())
    }

    /// Read `count` elements starting at element `index`, decoded
    pub fn read_values(&self, name: &str, index: u64, count: u64) -> Result<Vec<Value>> {
        let ty = self.info(name)?.ty;
        let size = ty.byte_size();
        let bytes = self.read(name, index.saturating_mul(size), count.saturating_mul(size))?;
        Value::deserialize_all(&bytes, &ty)
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Descriptor of one variable
    pub fn info(&self, name: &str) -> Result<VarInfo> {
        self.with_cursor(|cursor| cursor.info(name))
    }

    /// Every variable, ordered by name
    pub fn list(&self) -> Result<Vec<VarInfo>> {
        self.with_cursor(|cursor| cursor.list())
    }

    /// Validate the content tree of one variable
    pub fn check(&self, name: &str) -> Result<TreeStats> {
        self.with_cursor(|cursor| cursor.check(name))
    }

    /// Pages on the free list
    pub fn free_list_len(&self) -> u32 {
        self.pager.lock().free_list_len()
    }

    /// Pages in the file
    pub fn page_count(&self) -> u32 {
        self.pager.lock().page_count()
    }

    /// Get the config
    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Force all writes to disk
    pub fn flush(&self) -> Result<()> {
        self.pager.lock().sync()
    }

    /// Flush and close the engine
    pub fn close(self) -> Result<()> {
        self.flush()?;
        debug!(path = %self.config.path.display(), "engine closed");
        Ok(())
    }

    fn with_cursor<T>(&self, f: impl FnOnce(&mut Cursor<'_>) -> Result<T>) -> Result<T> {
        let mut vm = self.vm.lock();
        let mut pager = self.pager.lock();
        vm.with_cursor(&mut pager, f)
    }
}
