//! Values and their little-endian wire form.

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

use super::Type;
use crate::error::{NumstoreError, Result};

/// A typed value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Bool(bool),
    /// A strict array value, or a run of elements when inserted as a batch
    Array(Vec<Value>),
}

impl Value {
    /// True if this value is exactly one value of `ty`
    pub fn has_type(&self, ty: &Type) -> bool {
        match (self, ty) {
            (Value::U8(_), Type::U8)
            | (Value::U16(_), Type::U16)
            | (Value::U32(_), Type::U32)
            | (Value::U64(_), Type::U64)
            | (Value::I8(_), Type::I8)
            | (Value::I16(_), Type::I16)
            | (Value::I32(_), Type::I32)
            | (Value::I64(_), Type::I64)
            | (Value::F32(_), Type::F32)
            | (Value::F64(_), Type::F64)
            | (Value::Bool(_), Type::Bool) => true,
            (Value::Array(items), Type::Array { elem, len }) => {
                items.len() == *len as usize && items.iter().all(|v| v.has_type(elem))
            }
            _ => false,
        }
    }

    /// True if this value can be stored in a variable of element type `ty`:
    /// either a single `ty` value or a non-empty run of them.
    pub fn conforms_to(&self, ty: &Type) -> bool {
        if self.has_type(ty) {
            return true;
        }
        match self {
            Value::Array(items) => !items.is_empty() && items.iter().all(|v| v.conforms_to(ty)),
            _ => false,
        }
    }

    /// Number of bytes `serialize_into` writes
    pub fn serialized_len(&self) -> usize {
        match self {
            Value::U8(_) | Value::I8(_) | Value::Bool(_) => 1,
            Value::U16(_) | Value::I16(_) => 2,
            Value::U32(_) | Value::I32(_) | Value::F32(_) => 4,
            Value::U64(_) | Value::I64(_) | Value::F64(_) => 8,
            Value::Array(items) => items.iter().map(Value::serialized_len).sum(),
        }
    }

    /// Write the little-endian form into `buf`, returning the bytes written.
    ///
    /// `buf` must hold at least `serialized_len()` bytes.
    pub fn serialize_into(&self, buf: &mut [u8]) -> usize {
        let start = buf.len();
        let mut out = buf;
        self.put(&mut out);
        start - out.len()
    }

    /// Serialize into a fresh vector
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.serialized_len());
        self.put(&mut buf);
        buf
    }

    fn put<B: BufMut>(&self, out: &mut B) {
        match self {
            Value::U8(v) => out.put_u8(*v),
            Value::U16(v) => out.put_u16_le(*v),
            Value::U32(v) => out.put_u32_le(*v),
            Value::U64(v) => out.put_u64_le(*v),
            Value::I8(v) => out.put_i8(*v),
            Value::I16(v) => out.put_i16_le(*v),
            Value::I32(v) => out.put_i32_le(*v),
            Value::I64(v) => out.put_i64_le(*v),
            Value::F32(v) => out.put_f32_le(*v),
            Value::F64(v) => out.put_f64_le(*v),
            Value::Bool(v) => out.put_u8(*v as u8),
            Value::Array(items) => {
                for item in items {
                    item.put(out);
                }
            }
        }
    }

    /// Decode exactly one value of `ty` from `bytes`
    pub fn deserialize(bytes: &[u8], ty: &Type) -> Result<Value> {
        if bytes.len() as u64 != ty.byte_size() {
            return Err(NumstoreError::Serialization(format!(
                "expected {} bytes for {}, got {}",
                ty.byte_size(),
                ty,
                bytes.len()
            )));
        }
        let mut src = bytes;
        Self::get(&mut src, ty)
    }

    /// Decode a run of `ty` values filling `bytes`
    pub fn deserialize_all(bytes: &[u8], ty: &Type) -> Result<Vec<Value>> {
        let size = ty.byte_size() as usize;
        if size == 0 || bytes.len() % size != 0 {
            return Err(NumstoreError::Serialization(format!(
                "{} bytes is not a whole number of {} values",
                bytes.len(),
                ty
            )));
        }
        bytes
            .chunks_exact(size)
            .map(|chunk| Self::deserialize(chunk, ty))
            .collect()
    }

    fn get(src: &mut &[u8], ty: &Type) -> Result<Value> {
        let value = match ty {
            Type::U8 => Value::U8(src.get_u8()),
            Type::U16 => Value::U16(src.get_u16_le()),
            Type::U32 => Value::U32(src.get_u32_le()),
            Type::U64 => Value::U64(src.get_u64_le()),
            Type::I8 => Value::I8(src.get_i8()),
            Type::I16 => Value::I16(src.get_i16_le()),
            Type::I32 => Value::I32(src.get_i32_le()),
            Type::I64 => Value::I64(src.get_i64_le()),
            Type::F32 => Value::F32(src.get_f32_le()),
            Type::F64 => Value::F64(src.get_f64_le()),
            Type::Bool => match src.get_u8() {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                b => {
                    return Err(NumstoreError::Serialization(format!(
                        "invalid bool byte 0x{:02x}",
                        b
                    )))
                }
            },
            Type::Array { elem, len } => {
                let mut items = Vec::with_capacity(*len as usize);
                for _ in 0..*len {
                    items.push(Self::get(src, elem)?);
                }
                Value::Array(items)
            }
        };
        Ok(value)
    }
}
