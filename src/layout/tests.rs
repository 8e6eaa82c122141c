use bytemuck::Zeroable;

use super::tables;
use crate::error::Error;
use crate::ffi::types::*;

/// Every descriptor must tile its struct exactly: ascending offsets, padding
/// declared, nothing left over. This is the only local defense against a
/// descriptor drifting from its `#[repr(C)]` mirror.
#[test]
fn all_layouts_are_contiguous() {
    for layout in tables::ALL {
        if let Err(msg) = layout.check_contiguous() {
            panic!("layout descriptor inconsistent: {msg}");
        }
    }
}

#[test]
fn nested_path_resolution() {
    assert_eq!(tables::BODY_DEF.offset_of("position").unwrap(), 4);
    assert_eq!(tables::BODY_DEF.offset_of("position.y").unwrap(), 8);
    assert_eq!(tables::BODY_DEF.offset_of("rotation.s").unwrap(), 16);
    assert_eq!(tables::TRANSFORM.offset_of("q.c").unwrap(), 8);
    assert_eq!(
        tables::BODY_MOVE_EVENT.offset_of("transform.p.x").unwrap(),
        0
    );
    assert_eq!(tables::BODY_MOVE_EVENT.offset_of("body.world").unwrap(), 20);
}

#[test]
fn array_path_resolution() {
    assert_eq!(tables::POLYGON.offset_of("vertices[0].x").unwrap(), 0);
    assert_eq!(tables::POLYGON.offset_of("vertices[3].y").unwrap(), 28);
    assert_eq!(tables::POLYGON.offset_of("normals[1]").unwrap(), 72);
    assert_eq!(tables::MANIFOLD.offset_of("points[1].separation").unwrap(), 24);

    // Out-of-bounds index is an unknown field, not a wrap-around.
    assert!(matches!(
        tables::POLYGON.offset_of("vertices[8]"),
        Err(Error::UnknownField { .. })
    ));
}

#[test]
fn unknown_paths_are_rejected() {
    assert!(matches!(
        tables::BODY_DEF.offset_of("positon"),
        Err(Error::UnknownField { .. })
    ));
    assert!(matches!(
        tables::BODY_DEF.offset_of("position.z"),
        Err(Error::UnknownField { .. })
    ));
    // Padding is never addressable.
    assert!(matches!(
        tables::SHAPE_DEF.offset_of("_pad0"),
        Err(Error::UnknownField { .. })
    ));
}

#[test]
fn field_accessors_are_type_checked() {
    assert!(tables::SHAPE_DEF.field::<f32>("friction").is_ok());
    assert!(tables::SHAPE_DEF.field::<u64>("filter.category_bits").is_ok());
    assert!(tables::SHAPE_DEF.field::<u8>("is_sensor").is_ok());
    assert!(matches!(
        tables::SHAPE_DEF.field::<f32>("filter.category_bits"),
        Err(Error::FieldKind { .. })
    ));
    assert!(matches!(
        tables::SHAPE_DEF.field::<u16>("friction"),
        Err(Error::FieldKind { .. })
    ));
}

#[test]
fn accessor_round_trip_through_repr_c_mirror() {
    // Write through accessors into raw bytes, read back through the mirror
    // struct. This is the round-trip that catches offset mistakes.
    let mut def = GrShapeDef::default();
    let bytes = unsafe {
        std::slice::from_raw_parts_mut(
            (&mut def as *mut GrShapeDef).cast::<u8>(),
            std::mem::size_of::<GrShapeDef>(),
        )
    };

    tables::SHAPE_DEF
        .field::<f32>("density")
        .unwrap()
        .set(bytes, 7.5);
    tables::SHAPE_DEF
        .field::<u64>("filter.mask_bits")
        .unwrap()
        .set(bytes, 0xDEAD);
    tables::SHAPE_DEF
        .field::<u8>("is_sensor")
        .unwrap()
        .set(bytes, 1);

    assert_eq!(def.density, 7.5);
    assert_eq!(def.filter.mask_bits, 0xDEAD);
    assert_eq!(def.is_sensor, 1);
    // Untouched neighbors keep their defaults.
    assert_eq!(def.friction, 0.6);
    assert_eq!(def.magic, GR_DEF_MAGIC);
}

#[test]
fn accessor_reads_event_records_in_place() {
    let ev = GrBodyMoveEvent {
        transform: GrTransform {
            p: GrVec2::new(3.0, -2.0),
            q: GrRot::from_angle(0.5),
        },
        body: GrBodyId {
            index: 42,
            world: 1,
            generation: 9,
        },
        fell_asleep: 1,
        _pad0: [0; 3],
    };
    let bytes = bytemuck::bytes_of(&ev);

    let x = tables::BODY_MOVE_EVENT.field::<f32>("transform.p.x").unwrap();
    let gen = tables::BODY_MOVE_EVENT.field::<u16>("body.generation").unwrap();
    let asleep = tables::BODY_MOVE_EVENT.field::<u8>("fell_asleep").unwrap();

    assert_eq!(x.get(bytes), 3.0);
    assert_eq!(gen.get(bytes), 9);
    assert_eq!(asleep.get(bytes), 1);
}

#[test]
fn zeroed_polygon_reads_back_zero() {
    let p = GrPolygon::zeroed();
    let bytes = bytemuck::bytes_of(&p);
    let count = tables::POLYGON.field::<i32>("count").unwrap();
    assert_eq!(count.get(bytes), 0);
}
