//! Configuration for numstore
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{NumstoreError, Result};

/// Smallest page size that still leaves room for a useful inner node
pub const MIN_PAGE_SIZE: usize = 128;

/// Largest page size (leaf byte counts are stored as u32, slot counts as u16)
pub const MAX_PAGE_SIZE: usize = 65536;

/// Main configuration for a numstore instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Path of the single paged database file
    pub path: PathBuf,

    /// Page size in bytes for newly created files.
    /// An existing file keeps the page size recorded in its superblock.
    pub page_size: usize,

    /// Hard cap on the number of pages in the file (None = unbounded)
    pub max_pages: Option<u32>,

    /// Verify page checksums on every typed read
    pub verify_checksums: bool,

    /// When to fsync the file
    pub sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Statement Limits
    // -------------------------------------------------------------------------
    /// Longest accepted variable name (bytes)
    pub max_name_len: usize,

    /// Largest serialized value a single statement may insert or read
    pub max_value_bytes: usize,
}

/// Sync strategy: how often to fsync the database file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every statement (safest, slowest)
    EveryStatement,

    /// fsync only on explicit `flush()` / `close()`
    Manual,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./numstore.db"),
            page_size: 4096,
            max_pages: None,
            verify_checksums: true,
            sync_strategy: SyncStrategy::Manual,
            max_name_len: 255,
            max_value_bytes: 1024 * 1024, // 1 MB
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Bytes reserved for one statement's linear allocator.
    ///
    /// A statement needs at most: the variable name, the serialized value
    /// (or the read-out buffer, both bounded by `max_value_bytes`) and two
    /// pages worth of leaf bytes while a leaf is spliced and split.
    pub fn arena_capacity(&self) -> usize {
        self.max_name_len + self.max_value_bytes + 2 * self.page_size
    }

    /// Check that the values are usable
    pub fn validate(&self) -> Result<()> {
        if !self.page_size.is_power_of_two()
            || self.page_size < MIN_PAGE_SIZE
            || self.page_size > MAX_PAGE_SIZE
        {
            return Err(NumstoreError::Config(format!(
                "page_size must be a power of two in {}..={}, got {}",
                MIN_PAGE_SIZE, MAX_PAGE_SIZE, self.page_size
            )));
        }

        if self.max_name_len == 0 || self.max_name_len > u16::MAX as usize {
            return Err(NumstoreError::Config(format!(
                "max_name_len must be in 1..={}, got {}",
                u16::MAX,
                self.max_name_len
            )));
        }

        if self.max_value_bytes == 0 {
            return Err(NumstoreError::Config(
                "max_value_bytes must be non-zero".to_string(),
            ));
        }

        if let Some(max) = self.max_pages {
            // superblock + root hash page
            if max < 2 {
                return Err(NumstoreError::Config(format!(
                    "max_pages must be at least 2, got {}",
                    max
                )));
            }
        }

        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the database file path
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Set the page size for new files
    pub fn page_size(mut self, size: usize) -> Self {
        self.config.page_size = size;
        self
    }

    /// Cap the file at `count` pages
    pub fn max_pages(mut self, count: u32) -> Self {
        self.config.max_pages = Some(count);
        self
    }

    /// Enable or disable checksum verification on reads
    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.config.verify_checksums = verify;
        self
    }

    /// Set the sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the longest accepted variable name
    pub fn max_name_len(mut self, len: usize) -> Self {
        self.config.max_name_len = len;
        self
    }

    /// Set the largest value a statement may carry
    pub fn max_value_bytes(mut self, bytes: usize) -> Self {
        self.config.max_value_bytes = bytes;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
