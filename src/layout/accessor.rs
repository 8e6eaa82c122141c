//! Typed, offset-bound field accessors.

use std::marker::PhantomData;

use bytemuck::Pod;

use super::FieldKind;

/// Primitive types addressable through a [`Field`]. The kind check keeps a
/// `Field<f32>` from ever being bound to, say, a `U64` slot.
pub trait Primitive: Pod {
    const NAME: &'static str;
    fn matches(kind: FieldKind) -> bool;
}

macro_rules! primitive {
    ($ty:ty, $name:literal, $($kind:pat),+) => {
        impl Primitive for $ty {
            const NAME: &'static str = $name;
            fn matches(kind: FieldKind) -> bool {
                matches!(kind, $($kind)|+)
            }
        }
    };
}

// Bool fields read/write as u8; the ABI has no other boolean width.
primitive!(u8, "u8", FieldKind::U8, FieldKind::Bool);
primitive!(i16, "i16", FieldKind::I16);
primitive!(u16, "u16", FieldKind::U16);
primitive!(i32, "i32", FieldKind::I32);
primitive!(u32, "u32", FieldKind::U32);
primitive!(u64, "u64", FieldKind::U64);
primitive!(f32, "f32", FieldKind::F32);

/// An accessor bound to one field's byte offset within a region laid out by a
/// [`super::StructLayout`]. Copy-cheap; bind once, reuse per region.
#[derive(Debug, Clone, Copy)]
pub struct Field<T: Primitive> {
    offset: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Primitive> Field<T> {
    pub(super) fn at(offset: usize) -> Self {
        Field {
            offset,
            _marker: PhantomData,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Reads the field out of `region`. Unaligned reads are fine: regions may
    /// come from packed native buffers.
    ///
    /// # Panics
    /// If the region is shorter than `offset + size_of::<T>()`.
    pub fn get(&self, region: &[u8]) -> T {
        let end = self.offset + std::mem::size_of::<T>();
        bytemuck::pod_read_unaligned(&region[self.offset..end])
    }

    /// Writes the field into `region`.
    ///
    /// # Panics
    /// If the region is shorter than `offset + size_of::<T>()`.
    pub fn set(&self, region: &mut [u8], value: T) {
        let end = self.offset + std::mem::size_of::<T>();
        region[self.offset..end].copy_from_slice(bytemuck::bytes_of(&value));
    }
}
