//! Error types for numstore
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

use crate::pager::{PageKind, Pgno};

/// Result type alias using NumstoreError
pub type Result<T> = std::result::Result<T, NumstoreError>;

/// Unified error type for numstore operations
#[derive(Debug, Error)]
pub enum NumstoreError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Page Errors
    // -------------------------------------------------------------------------
    #[error("Corrupt page {pgno}: {reason}")]
    CorruptPage { pgno: Pgno, reason: String },

    #[error("Invalid page type at {pgno}: expected {expected:?}, found {found:?}")]
    InvalidPageType {
        pgno: Pgno,
        expected: PageKind,
        found: PageKind,
    },

    // -------------------------------------------------------------------------
    // Allocation Errors
    // -------------------------------------------------------------------------
    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    #[error("Out of space: {0}")]
    OutOfSpace(String),

    // -------------------------------------------------------------------------
    // Variable Errors
    // -------------------------------------------------------------------------
    #[error("Variable not found: {0}")]
    NotFound(String),

    #[error("Variable already exists: {0}")]
    AlreadyExists(String),

    #[error("Offset {offset} out of range (length {length})")]
    OffsetOutOfRange { offset: u64, length: u64 },

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Variable name too long: {len} bytes (max {max})")]
    NameTooLong { len: usize, max: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification used by callers to decide whether a statement
/// failure leaves the database untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The named variable does not exist
    NotFound,
    /// IO failure, corruption or exhausted allocation; the statement aborts
    Structural,
    /// Request rejected before any page was touched
    Policy,
}

impl NumstoreError {
    /// Classify this error
    pub fn class(&self) -> ErrorClass {
        match self {
            NumstoreError::NotFound(_) => ErrorClass::NotFound,
            NumstoreError::Io(_)
            | NumstoreError::CorruptPage { .. }
            | NumstoreError::InvalidPageType { .. }
            | NumstoreError::OutOfMemory(_)
            | NumstoreError::OutOfSpace(_)
            | NumstoreError::Serialization(_) => ErrorClass::Structural,
            NumstoreError::AlreadyExists(_)
            | NumstoreError::OffsetOutOfRange { .. }
            | NumstoreError::TypeMismatch(_)
            | NumstoreError::NameTooLong { .. }
            | NumstoreError::InvalidArgument(_)
            | NumstoreError::Config(_) => ErrorClass::Policy,
        }
    }

    /// Shorthand for building a `CorruptPage` error
    pub(crate) fn corrupt(pgno: Pgno, reason: impl Into<String>) -> Self {
        NumstoreError::CorruptPage {
            pgno,
            reason: reason.into(),
        }
    }
}

impl From<bincode::Error> for NumstoreError {
    fn from(e: bincode::Error) -> Self {
        NumstoreError::Serialization(e.to_string())
    }
}
