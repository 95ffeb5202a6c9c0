//! Types Module
//!
//! Minimal type/value service consumed by the storage core.
//!
//! ## Responsibilities
//! - Describe the element type of a variable (`Type`)
//! - Report the serialized size of a type (`Type::byte_size`)
//! - Serialize and deserialize values (`Value`)
//!
//! The storage core never looks inside a value; it only asks for its
//! serialized bytes and checks that they conform to the variable's type.

mod value;

pub use value::Value;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{NumstoreError, Result};

/// Element type of a variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Type {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Bool,
    /// Fixed-length strict array of `len` elements
    Array { elem: Box<Type>, len: u32 },
}

impl Type {
    /// Serialized size of one value of this type.
    ///
    /// Saturates at `u64::MAX` for nested arrays too large to address;
    /// `checked_byte_size` tells the two apart.
    pub fn byte_size(&self) -> u64 {
        self.checked_byte_size().unwrap_or(u64::MAX)
    }

    /// Serialized size, or `None` if it overflows `u64`
    pub fn checked_byte_size(&self) -> Option<u64> {
        match self {
            Type::U8 | Type::I8 | Type::Bool => Some(1),
            Type::U16 | Type::I16 => Some(2),
            Type::U32 | Type::I32 | Type::F32 => Some(4),
            Type::U64 | Type::I64 | Type::F64 => Some(8),
            Type::Array { elem, len } => elem.checked_byte_size()?.checked_mul(u64::from(*len)),
        }
    }

    /// Convenience constructor for `Array`
    pub fn array(elem: Type, len: u32) -> Self {
        Type::Array {
            elem: Box::new(elem),
            len,
        }
    }

    /// Encode this descriptor for storage in a var page
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode a descriptor written by `encode`
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| NumstoreError::Serialization(format!("bad type descriptor: {}", e)))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::U8 => write!(f, "u8"),
            Type::U16 => write!(f, "u16"),
            Type::U32 => write!(f, "u32"),
            Type::U64 => write!(f, "u64"),
            Type::I8 => write!(f, "i8"),
            Type::I16 => write!(f, "i16"),
            Type::I32 => write!(f, "i32"),
            Type::I64 => write!(f, "i64"),
            Type::F32 => write!(f, "f32"),
            Type::F64 => write!(f, "f64"),
            Type::Bool => write!(f, "bool"),
            Type::Array { elem, len } => write!(f, "[{}; {}]", elem, len),
        }
    }
}
