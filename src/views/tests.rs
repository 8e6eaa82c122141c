use glam::Vec2;
use proptest::prelude::*;

use super::*;
use crate::arena::{Region, Scope};
use crate::ffi::types::{GrFilter, GrRot};
use crate::layout::tables;

#[test]
fn vec2_view_round_trip() {
    let mut region = Region::for_layout(&tables::VEC2);
    let mut view = Vec2View::bind(region.bytes_mut());
    view.write(Vec2::new(1.5, -2.25));
    assert_eq!(view.get(), Vec2::new(1.5, -2.25));
}

#[test]
fn transform_view_over_scope_temporary() {
    let scope = Scope::new();
    let region = scope.alloc_layout(&tables::TRANSFORM);
    let mut view = TransformView::bind(region);
    assert_eq!(view.get(), Transform::IDENTITY);

    let t = Transform {
        position: Vec2::new(3.0, 4.0),
        rotation: GrRot::from_angle(1.0),
    };
    view.write(t);
    assert_eq!(view.get(), t);
}

#[test]
fn struct_view_copy_skips_padding() {
    let mut src_region = Region::for_layout(&tables::BODY_DEF);
    let mut dst_region = Region::for_layout(&tables::BODY_DEF);

    {
        let mut src = StructView::bind(&tables::BODY_DEF, src_region.bytes_mut());
        src.set::<f32>("position.x", 2.5).unwrap();
        src.set::<f32>("position.y", -7.0).unwrap();
        src.set::<u8>("fixed_rotation", 1).unwrap();
        src.set::<i32>("magic", 99).unwrap();
    }
    // Poison padding bytes in the source region directly.
    let pad_offset = tables::BODY_DEF.offset_of("is_enabled").unwrap() + 1;
    src_region.bytes_mut()[pad_offset..pad_offset + 3].fill(0xEE);

    {
        let src = StructView::bind(&tables::BODY_DEF, src_region.bytes_mut());
        let mut dst = StructView::bind(&tables::BODY_DEF, dst_region.bytes_mut());
        dst.copy_from(&src);
    }

    let dst = StructView::bind(&tables::BODY_DEF, dst_region.bytes_mut());
    assert_eq!(dst.get::<f32>("position.x").unwrap(), 2.5);
    assert_eq!(dst.get::<f32>("position.y").unwrap(), -7.0);
    assert_eq!(dst.get::<u8>("fixed_rotation").unwrap(), 1);
    assert_eq!(dst.get::<i32>("magic").unwrap(), 99);
    // Padding stayed zero in the destination.
    assert_eq!(&dst_region.bytes()[pad_offset..pad_offset + 3], &[0, 0, 0]);
}

#[test]
fn struct_view_round_trip_all_primitive_kinds() {
    // bool / u16 / i32 / f32 / nested vector, per the bridge contract.
    let mut src_region = Region::for_layout(&tables::BODY_MOVE_EVENT);
    let mut dst_region = Region::for_layout(&tables::BODY_MOVE_EVENT);

    {
        let mut src = StructView::bind(&tables::BODY_MOVE_EVENT, src_region.bytes_mut());
        src.set::<f32>("transform.p.x", 10.5).unwrap();
        src.set::<f32>("transform.q.s", -0.5).unwrap();
        src.set::<i32>("body.index", 1234).unwrap();
        src.set::<u16>("body.generation", 77).unwrap();
        src.set::<u8>("fell_asleep", 1).unwrap();
    }
    {
        let src = StructView::bind(&tables::BODY_MOVE_EVENT, src_region.bytes_mut());
        let mut dst = StructView::bind(&tables::BODY_MOVE_EVENT, dst_region.bytes_mut());
        dst.copy_from(&src);
    }

    let copy = StructView::bind(&tables::BODY_MOVE_EVENT, dst_region.bytes_mut());
    assert_eq!(copy.get::<f32>("transform.p.x").unwrap(), 10.5);
    assert_eq!(copy.get::<f32>("transform.q.s").unwrap(), -0.5);
    assert_eq!(copy.get::<i32>("body.index").unwrap(), 1234);
    assert_eq!(copy.get::<u16>("body.generation").unwrap(), 77);
    assert_eq!(copy.get::<u8>("fell_asleep").unwrap(), 1);
}

#[test]
fn filter_view_round_trip() {
    let mut region = Region::for_layout(&tables::FILTER);
    let mut view = FilterView::bind(region.bytes_mut());
    let filter = GrFilter {
        category_bits: 0b1010,
        mask_bits: 0xFFFF_0000,
        group_index: -4,
        _pad0: 0,
    };
    view.write(filter);
    assert_eq!(view.get(), filter);
}

proptest! {
    #[test]
    fn aabb_view_round_trips(
        lx in -1.0e6f32..1.0e6,
        ly in -1.0e6f32..1.0e6,
        w in 0.0f32..1.0e6,
        h in 0.0f32..1.0e6,
    ) {
        let mut region = Region::for_layout(&tables::AABB);
        let mut view = AabbView::bind(region.bytes_mut());
        let aabb = Aabb {
            lower: Vec2::new(lx, ly),
            upper: Vec2::new(lx + w, ly + h),
        };
        view.write(aabb);
        prop_assert_eq!(view.get(), aabb);
    }

    #[test]
    fn transform_copy_matches_source(
        x in -1.0e6f32..1.0e6,
        y in -1.0e6f32..1.0e6,
        angle in -3.14f32..3.14,
    ) {
        let mut a_region = Region::for_layout(&tables::TRANSFORM);
        let mut b_region = Region::for_layout(&tables::TRANSFORM);

        let t = Transform { position: Vec2::new(x, y), rotation: GrRot::from_angle(angle) };
        let mut a = TransformView::bind(a_region.bytes_mut());
        a.write(t);

        let mut b = TransformView::bind(b_region.bytes_mut());
        b.copy_from(&a);
        prop_assert_eq!(b.get(), t);
    }
}
