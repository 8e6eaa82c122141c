//! Memory Views: typed, zero-copy access to regions of foreign memory.
//!
//! A view binds to a raw byte region laid out by one of the descriptors in
//! [`crate::layout::tables`] and exposes `get`/`write` against application
//! value types ([`glam::Vec2`], [`Transform`], …). Views never own the
//! region and never copy on bind; `copy_from` moves data field-by-field
//! through the layout's accessors — never a raw bulk copy — so partial and
//! derived views over the same region stay consistent.
//!
//! Views are reusable scratch objects. A view bound over a call-scoped
//! temporary (a [`crate::arena::Scope`] allocation) cannot outlive the call:
//! the borrow checker enforces what the native ABI only documents.

use std::sync::OnceLock;

use glam::Vec2;

use crate::ffi::types::GrRot;
use crate::layout::{tables, Field, FieldKind, StructLayout};

// --- Application-facing value types ---

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    pub position: Vec2,
    pub rotation: GrRot,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        position: Vec2::ZERO,
        rotation: GrRot::IDENTITY,
    };
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub lower: Vec2,
    pub upper: Vec2,
}

// --- Generic struct view ---

/// A view over one region laid out per `layout`. The workhorse behind the
/// typed views below; also usable directly for definition staging and tests.
pub struct StructView<'a> {
    layout: &'static StructLayout,
    region: &'a mut [u8],
}

impl<'a> StructView<'a> {
    /// Binds without copying.
    ///
    /// # Panics
    /// If the region is shorter than the layout.
    pub fn bind(layout: &'static StructLayout, region: &'a mut [u8]) -> Self {
        assert!(
            region.len() >= layout.size,
            "region of {} bytes too small for layout {} ({} bytes)",
            region.len(),
            layout.name,
            layout.size
        );
        StructView { layout, region }
    }

    pub fn layout(&self) -> &'static StructLayout {
        self.layout
    }

    pub fn get<T: crate::layout::Primitive>(&self, path: &str) -> crate::Result<T> {
        Ok(self.layout.field::<T>(path)?.get(self.region))
    }

    pub fn set<T: crate::layout::Primitive>(&mut self, path: &str, value: T) -> crate::Result<()> {
        self.layout.field::<T>(path)?.set(self.region, value);
        Ok(())
    }

    /// Copies every non-padding field from `other`, one primitive leaf at a
    /// time. Both views must share a layout.
    ///
    /// # Panics
    /// If the layouts differ.
    pub fn copy_from(&mut self, other: &StructView<'_>) {
        assert!(
            std::ptr::eq(self.layout, other.layout),
            "copy_from across layouts: {} vs {}",
            self.layout.name,
            other.layout.name
        );
        copy_fields(self.layout, self.region, other.region, 0);
    }
}

/// Recursive field-wise copy. Padding is skipped on purpose: padding bytes
/// are not part of the contract and may hold garbage in native memory.
fn copy_fields(layout: &StructLayout, dst: &mut [u8], src: &[u8], base: usize) {
    for field in layout.fields {
        copy_kind(&field.kind, dst, src, base + field.offset);
    }
}

fn copy_kind(kind: &FieldKind, dst: &mut [u8], src: &[u8], at: usize) {
    match kind {
        FieldKind::Pad(_) => {}
        FieldKind::Struct(inner) => copy_fields(inner, dst, src, at),
        FieldKind::Array(elem, len) => {
            let stride = elem.byte_size();
            for i in 0..*len {
                copy_kind(elem, dst, src, at + i * stride);
            }
        }
        primitive => {
            let size = primitive.byte_size();
            dst[at..at + size].copy_from_slice(&src[at..at + size]);
        }
    }
}

// --- Typed views ---
//
// Accessors are path-resolved once and cached; binding a view is offset
// arithmetic only.

struct Vec2Fields {
    x: Field<f32>,
    y: Field<f32>,
}

fn vec2_fields() -> &'static Vec2Fields {
    static FIELDS: OnceLock<Vec2Fields> = OnceLock::new();
    FIELDS.get_or_init(|| Vec2Fields {
        x: tables::VEC2.field("x").unwrap(),
        y: tables::VEC2.field("y").unwrap(),
    })
}

/// View of a native `GrVec2` region.
pub struct Vec2View<'a> {
    region: &'a mut [u8],
}

impl<'a> Vec2View<'a> {
    pub fn bind(region: &'a mut [u8]) -> Self {
        assert!(region.len() >= tables::VEC2.size);
        Vec2View { region }
    }

    pub fn get(&self) -> Vec2 {
        let f = vec2_fields();
        Vec2::new(f.x.get(self.region), f.y.get(self.region))
    }

    pub fn write(&mut self, v: Vec2) {
        let f = vec2_fields();
        f.x.set(self.region, v.x);
        f.y.set(self.region, v.y);
    }

    pub fn copy_from(&mut self, other: &Vec2View<'_>) {
        let f = vec2_fields();
        f.x.set(self.region, f.x.get(other.region));
        f.y.set(self.region, f.y.get(other.region));
    }
}

struct RotFields {
    c: Field<f32>,
    s: Field<f32>,
}

fn rot_fields() -> &'static RotFields {
    static FIELDS: OnceLock<RotFields> = OnceLock::new();
    FIELDS.get_or_init(|| RotFields {
        c: tables::ROT.field("c").unwrap(),
        s: tables::ROT.field("s").unwrap(),
    })
}

pub struct RotView<'a> {
    region: &'a mut [u8],
}

impl<'a> RotView<'a> {
    pub fn bind(region: &'a mut [u8]) -> Self {
        assert!(region.len() >= tables::ROT.size);
        RotView { region }
    }

    pub fn get(&self) -> GrRot {
        let f = rot_fields();
        GrRot {
            c: f.c.get(self.region),
            s: f.s.get(self.region),
        }
    }

    pub fn write(&mut self, q: GrRot) {
        let f = rot_fields();
        f.c.set(self.region, q.c);
        f.s.set(self.region, q.s);
    }
}

struct TransformFields {
    px: Field<f32>,
    py: Field<f32>,
    qc: Field<f32>,
    qs: Field<f32>,
}

fn transform_fields() -> &'static TransformFields {
    static FIELDS: OnceLock<TransformFields> = OnceLock::new();
    FIELDS.get_or_init(|| TransformFields {
        px: tables::TRANSFORM.field("p.x").unwrap(),
        py: tables::TRANSFORM.field("p.y").unwrap(),
        qc: tables::TRANSFORM.field("q.c").unwrap(),
        qs: tables::TRANSFORM.field("q.s").unwrap(),
    })
}

pub struct TransformView<'a> {
    region: &'a mut [u8],
}

impl<'a> TransformView<'a> {
    pub fn bind(region: &'a mut [u8]) -> Self {
        assert!(region.len() >= tables::TRANSFORM.size);
        TransformView { region }
    }

    pub fn get(&self) -> Transform {
        let f = transform_fields();
        Transform {
            position: Vec2::new(f.px.get(self.region), f.py.get(self.region)),
            rotation: GrRot {
                c: f.qc.get(self.region),
                s: f.qs.get(self.region),
            },
        }
    }

    pub fn write(&mut self, t: Transform) {
        let f = transform_fields();
        f.px.set(self.region, t.position.x);
        f.py.set(self.region, t.position.y);
        f.qc.set(self.region, t.rotation.c);
        f.qs.set(self.region, t.rotation.s);
    }

    pub fn copy_from(&mut self, other: &TransformView<'_>) {
        let f = transform_fields();
        f.px.set(self.region, f.px.get(other.region));
        f.py.set(self.region, f.py.get(other.region));
        f.qc.set(self.region, f.qc.get(other.region));
        f.qs.set(self.region, f.qs.get(other.region));
    }
}

struct AabbFields {
    lx: Field<f32>,
    ly: Field<f32>,
    ux: Field<f32>,
    uy: Field<f32>,
}

fn aabb_fields() -> &'static AabbFields {
    static FIELDS: OnceLock<AabbFields> = OnceLock::new();
    FIELDS.get_or_init(|| AabbFields {
        lx: tables::AABB.field("lower.x").unwrap(),
        ly: tables::AABB.field("lower.y").unwrap(),
        ux: tables::AABB.field("upper.x").unwrap(),
        uy: tables::AABB.field("upper.y").unwrap(),
    })
}

pub struct AabbView<'a> {
    region: &'a mut [u8],
}

impl<'a> AabbView<'a> {
    pub fn bind(region: &'a mut [u8]) -> Self {
        assert!(region.len() >= tables::AABB.size);
        AabbView { region }
    }

    pub fn get(&self) -> Aabb {
        let f = aabb_fields();
        Aabb {
            lower: Vec2::new(f.lx.get(self.region), f.ly.get(self.region)),
            upper: Vec2::new(f.ux.get(self.region), f.uy.get(self.region)),
        }
    }

    pub fn write(&mut self, aabb: Aabb) {
        let f = aabb_fields();
        f.lx.set(self.region, aabb.lower.x);
        f.ly.set(self.region, aabb.lower.y);
        f.ux.set(self.region, aabb.upper.x);
        f.uy.set(self.region, aabb.upper.y);
    }
}

struct FilterFields {
    category: Field<u64>,
    mask: Field<u64>,
    group: Field<i32>,
}

fn filter_fields() -> &'static FilterFields {
    static FIELDS: OnceLock<FilterFields> = OnceLock::new();
    FIELDS.get_or_init(|| FilterFields {
        category: tables::FILTER.field("category_bits").unwrap(),
        mask: tables::FILTER.field("mask_bits").unwrap(),
        group: tables::FILTER.field("group_index").unwrap(),
    })
}

pub struct FilterView<'a> {
    region: &'a mut [u8],
}

impl<'a> FilterView<'a> {
    pub fn bind(region: &'a mut [u8]) -> Self {
        assert!(region.len() >= tables::FILTER.size);
        FilterView { region }
    }

    pub fn get(&self) -> crate::ffi::types::GrFilter {
        let f = filter_fields();
        crate::ffi::types::GrFilter {
            category_bits: f.category.get(self.region),
            mask_bits: f.mask.get(self.region),
            group_index: f.group.get(self.region),
            _pad0: 0,
        }
    }

    pub fn write(&mut self, filter: crate::ffi::types::GrFilter) {
        let f = filter_fields();
        f.category.set(self.region, filter.category_bits);
        f.mask.set(self.region, filter.mask_bits);
        f.group.set(self.region, filter.group_index);
    }
}

/// Conversion used when materializing listener-facing values from records.
impl From<crate::ffi::types::GrTransform> for Transform {
    fn from(t: crate::ffi::types::GrTransform) -> Self {
        Transform {
            position: t.p.into(),
            rotation: t.q,
        }
    }
}

#[cfg(test)]
mod tests;
