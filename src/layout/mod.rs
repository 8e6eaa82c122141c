//! Layout Descriptors: declarative byte-layout descriptions of the native
//! structs, built once as statics and immutable thereafter.
//!
//! A [`StructLayout`] is a tree of named fields (primitive, nested struct,
//! array) with every padding byte spelled out. Descriptors exist so that
//! offset-bound accessors ([`Field`]) and memory views can address foreign
//! memory symbolically instead of sprinkling magic offsets through the crate.
//!
//! There is no independent validator against the native ABI itself — a wrong
//! offset only surfaces as corrupted data after a round-trip. What the crate
//! does verify (in tests) is internal consistency: descriptors cover their
//! struct contiguously, and every offset agrees with `mem::offset_of!` of the
//! corresponding `#[repr(C)]` mirror in [`crate::ffi::types`].

mod accessor;
pub mod tables;

pub use accessor::{Field, Primitive};

use crate::error::{Error, Result};

/// Kind of a single field within a [`StructLayout`].
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// One-byte boolean (C `_Bool`), read as 0/1.
    Bool,
    U8,
    I16,
    U16,
    I32,
    U32,
    U64,
    F32,
    /// Pointer-sized opaque value (data or function pointer).
    Ptr,
    /// Nested struct.
    Struct(&'static StructLayout),
    /// Fixed-length array of a single element kind.
    Array(&'static FieldKind, usize),
    /// Explicit padding; never addressable through a path.
    Pad(usize),
}

impl FieldKind {
    pub fn byte_size(&self) -> usize {
        match self {
            FieldKind::Bool | FieldKind::U8 => 1,
            FieldKind::I16 | FieldKind::U16 => 2,
            FieldKind::I32 | FieldKind::U32 | FieldKind::F32 => 4,
            FieldKind::U64 => 8,
            FieldKind::Ptr => std::mem::size_of::<usize>(),
            FieldKind::Struct(layout) => layout.size,
            FieldKind::Array(elem, len) => elem.byte_size() * len,
            FieldKind::Pad(len) => *len,
        }
    }
}

/// One named field at a fixed offset.
#[derive(Debug, Clone, Copy)]
pub struct FieldDesc {
    pub name: &'static str,
    pub offset: usize,
    pub kind: FieldKind,
}

/// Immutable byte-layout description of one native struct.
#[derive(Debug)]
pub struct StructLayout {
    pub name: &'static str,
    pub size: usize,
    pub align: usize,
    /// Fields in ascending offset order, padding included.
    pub fields: &'static [FieldDesc],
}

impl StructLayout {
    /// Resolves a symbolic field path (`"position.x"`, `"vertices[3].y"`) to
    /// its byte offset and kind.
    pub fn resolve(&self, path: &str) -> Result<(usize, FieldKind)> {
        let mut offset = 0usize;
        let mut layout = self;
        let mut segments = path.split('.').peekable();

        loop {
            let segment = segments.next().ok_or_else(|| self.unknown(path))?;
            let (name, index) = split_index(segment).ok_or_else(|| self.unknown(path))?;

            let field = layout
                .fields
                .iter()
                .find(|f| f.name == name && !matches!(f.kind, FieldKind::Pad(_)))
                .ok_or_else(|| self.unknown(path))?;
            offset += field.offset;

            let mut kind = field.kind;
            if let Some(i) = index {
                let FieldKind::Array(elem, len) = kind else {
                    return Err(self.unknown(path));
                };
                if i >= len {
                    return Err(self.unknown(path));
                }
                offset += elem.byte_size() * i;
                kind = *elem;
            }

            if segments.peek().is_none() {
                return Ok((offset, kind));
            }
            let FieldKind::Struct(inner) = kind else {
                return Err(self.unknown(path));
            };
            layout = inner;
        }
    }

    /// Byte offset of a field path.
    pub fn offset_of(&self, path: &str) -> Result<usize> {
        self.resolve(path).map(|(offset, _)| offset)
    }

    /// Returns a typed offset-bound accessor for a primitive field.
    pub fn field<T: Primitive>(&self, path: &str) -> Result<Field<T>> {
        let (offset, kind) = self.resolve(path)?;
        if !T::matches(kind) {
            return Err(Error::FieldKind {
                layout: self.name,
                path: path.to_owned(),
                expected: T::NAME,
            });
        }
        Ok(Field::at(offset))
    }

    /// Internal consistency check used by tests: fields (padding included)
    /// must tile `[0, size)` with no gaps and no overlap.
    pub fn check_contiguous(&self) -> std::result::Result<(), String> {
        let mut cursor = 0usize;
        for f in self.fields {
            if f.offset != cursor {
                return Err(format!(
                    "{}: field `{}` at offset {}, expected {}",
                    self.name, f.name, f.offset, cursor
                ));
            }
            cursor += f.kind.byte_size();
        }
        if cursor != self.size {
            return Err(format!(
                "{}: fields cover {} bytes, struct is {}",
                self.name, cursor, self.size
            ));
        }
        Ok(())
    }

    fn unknown(&self, path: &str) -> Error {
        Error::UnknownField {
            layout: self.name,
            path: path.to_owned(),
        }
    }
}

/// Splits `"vertices[3]"` into `("vertices", Some(3))`; plain names pass
/// through with `None`. Returns `None` on malformed brackets.
fn split_index(segment: &str) -> Option<(&str, Option<usize>)> {
    match segment.find('[') {
        None => Some((segment, None)),
        Some(open) => {
            let close = segment.rfind(']')?;
            if close != segment.len() - 1 || close <= open + 1 {
                return None;
            }
            let index: usize = segment[open + 1..close].parse().ok()?;
            Some((&segment[..open], Some(index)))
        }
    }
}

#[cfg(test)]
mod tests;
