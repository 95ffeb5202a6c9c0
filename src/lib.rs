//! # numstore
//!
//! Paged storage core for named, typed numeric variables:
//! - Single-file page store with a persistent free list
//! - Hash-page directory from variable name to descriptor
//! - Per-variable B-tree indexed by byte offset, so values can be inserted
//!   or removed anywhere in a variable, not just appended
//! - Per-statement linear allocator for every transient buffer
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Engine                              │
//! │                (Config, single write lock)                  │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ Query
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                           VM                                │
//! │            (dispatch, LinearAllocator per statement)        │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                         Cursor                              │
//! │ create / delete / insert / append / write / read / remove   │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │                                  │
//!            ▼                                  ▼
//!   ┌─────────────────┐                ┌─────────────────┐
//!   │  HashDirectory  │                │  Content tree   │
//!   │  (hash pages)   │                │ (inner + leaf)  │
//!   └────────┬────────┘                └────────┬────────┘
//!            └───────────────┬──────────────────┘
//!                            ▼
//!                    ┌───────────────┐
//!                    │     Pager     │
//!                    │ (file + free  │
//!                    │     list)     │
//!                    └───────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod arena;
pub mod types;
pub mod pager;
pub mod cursor;
pub mod query;
pub mod vm;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ErrorClass, NumstoreError, Result};
pub use config::{Config, SyncStrategy};
pub use arena::LinearAllocator;
pub use cursor::{Cursor, TreeStats, VarInfo};
pub use engine::Engine;
pub use pager::{Pager, PagerOptions, Pgno};
pub use query::{Query, QueryKind};
pub use types::{Type, Value};
pub use vm::{Vm, VmState};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of numstore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
