//! Var Page
//!
//! Descriptor page for one variable; the hash directory points here.
//!
//! ## Layout
//! ```text
//! ┌────────────┬──────────┬────────────┬─────────────┬─────────────┐
//! │ Header (8) │ Root (4) │ Length (8) │ NameLen (2) │ TypeLen (2) │
//! ├────────────┴──────────┴────────────┴─────────────┴─────────────┤
//! │ Name (UTF-8) │ Type descriptor (bincode)                      │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use bytes::{Buf, BufMut};

use super::page::COMMON_HEADER_SIZE;
use super::Pgno;
use crate::error::{NumstoreError, Result};
use crate::types::Type;

/// Var page header: common + root (4) + length (8) + name_len (2) + type_len (2)
pub const VAR_HEADER_SIZE: usize = COMMON_HEADER_SIZE + 16;

/// Decoded variable descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarPage {
    pub name: String,
    pub ty: Type,
    /// Logical content length in bytes
    pub length: u64,
    /// Root of the content tree (leaf or inner node)
    pub root: Pgno,
}

impl VarPage {
    pub fn new(name: impl Into<String>, ty: Type, root: Pgno) -> Self {
        Self {
            name: name.into(),
            ty,
            length: 0,
            root,
        }
    }

    /// Bytes this descriptor occupies on its page
    pub fn encoded_len(name: &str, ty: &Type) -> Result<usize> {
        Ok(VAR_HEADER_SIZE + name.len() + ty.encode()?.len())
    }

    pub(super) fn decode(pgno: Pgno, buf: &[u8]) -> Result<Self> {
        let mut src = &buf[COMMON_HEADER_SIZE..];
        let root = src.get_u32_le();
        let length = src.get_u64_le();
        let name_len = src.get_u16_le() as usize;
        let type_len = src.get_u16_le() as usize;

        if VAR_HEADER_SIZE + name_len + type_len > buf.len() {
            return Err(NumstoreError::corrupt(
                pgno,
                format!("var page name ({}) + type ({}) overflow page", name_len, type_len),
            ));
        }

        let name = std::str::from_utf8(&src[..name_len])
            .map_err(|e| NumstoreError::corrupt(pgno, format!("var name is not UTF-8: {}", e)))?
            .to_string();
        let ty = Type::decode(&src[name_len..name_len + type_len])?;

        Ok(Self {
            name,
            ty,
            length,
            root,
        })
    }

    pub(super) fn encode_into(&self, pgno: Pgno, buf: &mut [u8]) -> Result<()> {
        let ty = self.ty.encode()?;
        if VAR_HEADER_SIZE + self.name.len() + ty.len() > buf.len()
            || self.name.len() > u16::MAX as usize
        {
            return Err(NumstoreError::corrupt(
                pgno,
                format!("descriptor for {:?} does not fit one page", self.name),
            ));
        }

        let mut out = &mut buf[COMMON_HEADER_SIZE..];
        out.put_u32_le(self.root);
        out.put_u64_le(self.length);
        out.put_u16_le(self.name.len() as u16);
        out.put_u16_le(ty.len() as u16);
        out.put_slice(self.name.as_bytes());
        out.put_slice(&ty);
        Ok(())
    }
}
