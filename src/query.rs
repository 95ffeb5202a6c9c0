//! Query definitions
//!
//! Statements accepted by the VM. Parsing and planning happen upstream.

use std::fmt;

use crate::types::{Type, Value};

/// Query kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Create,
    Delete,
    Insert,
    Append,
    Write,
    Read,
    Remove,
}

impl QueryKind {
    /// Whether statements of this kind can change the file
    pub fn is_mutation(&self) -> bool {
        !matches!(self, QueryKind::Read)
    }
}

/// A parsed statement
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Create an empty variable
    Create { name: String, ty: Type },

    /// Delete a variable and its content
    Delete { name: String },

    /// Insert a value at a byte offset
    Insert {
        name: String,
        value: Value,
        offset: u64,
    },

    /// Insert a value at the end
    Append { name: String, value: Value },

    /// Overwrite existing content at a byte offset
    Write {
        name: String,
        value: Value,
        offset: u64,
    },

    /// Read up to `len` bytes from `offset`, taking every `stride`-th element
    Read {
        name: String,
        offset: u64,
        len: u64,
        stride: u32,
    },

    /// Remove `len` bytes from `offset`, every `stride`-th element, returning them
    Remove {
        name: String,
        offset: u64,
        len: u64,
        stride: u32,
    },
}

impl Query {
    /// Contiguous read of `len` bytes
    pub fn read(name: impl Into<String>, offset: u64, len: u64) -> Self {
        Query::Read {
            name: name.into(),
            offset,
            len,
            stride: 1,
        }
    }

    /// Contiguous removal of `len` bytes
    pub fn remove(name: impl Into<String>, offset: u64, len: u64) -> Self {
        Query::Remove {
            name: name.into(),
            offset,
            len,
            stride: 1,
        }
    }

    /// Get the query kind
    pub fn kind(&self) -> QueryKind {
        match self {
            Query::Create { .. } => QueryKind::Create,
            Query::Delete { .. } => QueryKind::Delete,
            Query::Insert { .. } => QueryKind::Insert,
            Query::Append { .. } => QueryKind::Append,
            Query::Write { .. } => QueryKind::Write,
            Query::Read { .. } => QueryKind::Read,
            Query::Remove { .. } => QueryKind::Remove,
        }
    }

    /// Variable the statement targets
    pub fn name(&self) -> &str {
        match self {
            Query::Create { name, .. }
            | Query::Delete { name }
            | Query::Insert { name, .. }
            | Query::Append { name, .. }
            | Query::Write { name, .. }
            | Query::Read { name, .. }
            | Query::Remove { name, .. } => name,
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Create { name, ty } => write!(f, "create {} {}", name, ty),
            Query::Delete { name } => write!(f, "delete {}", name),
            Query::Insert { name, value, offset } => write!(
                f,
                "insert {} @{} ({} bytes)",
                name,
                offset,
                value.serialized_len()
            ),
            Query::Append { name, value } => {
                write!(f, "append {} ({} bytes)", name, value.serialized_len())
            }
            Query::Write { name, value, offset } => write!(
                f,
                "write {} @{} ({} bytes)",
                name,
                offset,
                value.serialized_len()
            ),
            Query::Read {
                name,
                offset,
                len,
                stride,
            } => {
                write!(f, "read {} @{} len {}", name, offset, len)?;
                if *stride != 1 {
                    write!(f, " stride {}", stride)?;
                }
                Ok(())
            }
            Query::Remove {
                name,
                offset,
                len,
                stride,
            } => {
                write!(f, "remove {} @{} len {}", name, offset, len)?;
                if *stride != 1 {
                    write!(f, " stride {}", stride)?;
                }
                Ok(())
            }
        }
    }
}
