//! The layout descriptor tables for every native struct the bridge touches.
//!
//! Offsets are taken from the `#[repr(C)]` mirrors with `mem::offset_of!`, so
//! a mirror edit moves its descriptor with it; the documented ABI sizes stay
//! pinned separately by the `const_assert_eq` block in `ffi::types`.

use std::mem::{align_of, offset_of, size_of};

use super::{FieldDesc, FieldKind, StructLayout};
use crate::ffi::types::*;

macro_rules! struct_layout {
    ($vis:vis static $ident:ident: $ty:ty { $($fname:ident: $kind:expr),+ $(,)? }) => {
        $vis static $ident: StructLayout = StructLayout {
            name: stringify!($ty),
            size: size_of::<$ty>(),
            align: align_of::<$ty>(),
            fields: &[$(FieldDesc {
                name: stringify!($fname),
                offset: offset_of!($ty, $fname),
                kind: $kind,
            }),+],
        };
    };
}

// Element kinds referenced by array fields.
static VEC2_ELEM: FieldKind = FieldKind::Struct(&VEC2);
static MANIFOLD_POINT_ELEM: FieldKind = FieldKind::Struct(&MANIFOLD_POINT);

struct_layout!(pub static VEC2: GrVec2 {
    x: FieldKind::F32,
    y: FieldKind::F32,
});

struct_layout!(pub static ROT: GrRot {
    c: FieldKind::F32,
    s: FieldKind::F32,
});

struct_layout!(pub static TRANSFORM: GrTransform {
    p: FieldKind::Struct(&VEC2),
    q: FieldKind::Struct(&ROT),
});

struct_layout!(pub static AABB: GrAabb {
    lower: FieldKind::Struct(&VEC2),
    upper: FieldKind::Struct(&VEC2),
});

struct_layout!(pub static FILTER: GrFilter {
    category_bits: FieldKind::U64,
    mask_bits: FieldKind::U64,
    group_index: FieldKind::I32,
    _pad0: FieldKind::Pad(4),
});

struct_layout!(pub static WORLD_ID: GrWorldId {
    index: FieldKind::U16,
    generation: FieldKind::U16,
});

macro_rules! owned_id_layout {
    ($vis:vis static $ident:ident: $ty:ty) => {
        struct_layout!($vis static $ident: $ty {
            index: FieldKind::I32,
            world: FieldKind::U16,
            generation: FieldKind::U16,
        });
    };
}

owned_id_layout!(pub static BODY_ID: GrBodyId);
owned_id_layout!(pub static SHAPE_ID: GrShapeId);
owned_id_layout!(pub static JOINT_ID: GrJointId);
owned_id_layout!(pub static CHAIN_ID: GrChainId);

struct_layout!(pub static CIRCLE: GrCircle {
    center: FieldKind::Struct(&VEC2),
    radius: FieldKind::F32,
});

struct_layout!(pub static SEGMENT: GrSegment {
    point1: FieldKind::Struct(&VEC2),
    point2: FieldKind::Struct(&VEC2),
});

struct_layout!(pub static POLYGON: GrPolygon {
    vertices: FieldKind::Array(&VEC2_ELEM, GR_MAX_POLYGON_VERTS),
    normals: FieldKind::Array(&VEC2_ELEM, GR_MAX_POLYGON_VERTS),
    centroid: FieldKind::Struct(&VEC2),
    radius: FieldKind::F32,
    count: FieldKind::I32,
});

struct_layout!(pub static MANIFOLD_POINT: GrManifoldPoint {
    point: FieldKind::Struct(&VEC2),
    separation: FieldKind::F32,
    normal_impulse: FieldKind::F32,
});

struct_layout!(pub static MANIFOLD: GrManifold {
    points: FieldKind::Array(&MANIFOLD_POINT_ELEM, 2),
    normal: FieldKind::Struct(&VEC2),
    point_count: FieldKind::I32,
    _pad0: FieldKind::Pad(4),
});

struct_layout!(pub static WORLD_DEF: GrWorldDef {
    gravity: FieldKind::Struct(&VEC2),
    restitution_threshold: FieldKind::F32,
    contact_hertz: FieldKind::F32,
    contact_damping_ratio: FieldKind::F32,
    maximum_linear_speed: FieldKind::F32,
    worker_count: FieldKind::I32,
    enable_sleep: FieldKind::Bool,
    enable_continuous: FieldKind::Bool,
    _pad0: FieldKind::Pad(2),
    enqueue_task: FieldKind::Ptr,
    finish_task: FieldKind::Ptr,
    user_task_context: FieldKind::Ptr,
    magic: FieldKind::I32,
    _pad1: FieldKind::Pad(4),
});

struct_layout!(pub static BODY_DEF: GrBodyDef {
    body_type: FieldKind::I32,
    position: FieldKind::Struct(&VEC2),
    rotation: FieldKind::Struct(&ROT),
    linear_velocity: FieldKind::Struct(&VEC2),
    angular_velocity: FieldKind::F32,
    linear_damping: FieldKind::F32,
    angular_damping: FieldKind::F32,
    gravity_scale: FieldKind::F32,
    sleep_threshold: FieldKind::F32,
    enable_sleep: FieldKind::Bool,
    is_awake: FieldKind::Bool,
    fixed_rotation: FieldKind::Bool,
    is_bullet: FieldKind::Bool,
    is_enabled: FieldKind::Bool,
    _pad0: FieldKind::Pad(3),
    magic: FieldKind::I32,
});

struct_layout!(pub static SHAPE_DEF: GrShapeDef {
    filter: FieldKind::Struct(&FILTER),
    friction: FieldKind::F32,
    restitution: FieldKind::F32,
    density: FieldKind::F32,
    is_sensor: FieldKind::Bool,
    enable_sensor_events: FieldKind::Bool,
    enable_contact_events: FieldKind::Bool,
    enable_hit_events: FieldKind::Bool,
    enable_pre_solve_events: FieldKind::Bool,
    _pad0: FieldKind::Pad(3),
    magic: FieldKind::I32,
});

struct_layout!(pub static CHAIN_DEF: GrChainDef {
    points: FieldKind::Ptr,
    count: FieldKind::I32,
    friction: FieldKind::F32,
    restitution: FieldKind::F32,
    _pad0: FieldKind::Pad(4),
    filter: FieldKind::Struct(&FILTER),
    is_loop: FieldKind::Bool,
    _pad1: FieldKind::Pad(3),
    magic: FieldKind::I32,
});

struct_layout!(pub static DISTANCE_JOINT_DEF: GrDistanceJointDef {
    body_a: FieldKind::Struct(&BODY_ID),
    body_b: FieldKind::Struct(&BODY_ID),
    local_anchor_a: FieldKind::Struct(&VEC2),
    local_anchor_b: FieldKind::Struct(&VEC2),
    length: FieldKind::F32,
    min_length: FieldKind::F32,
    max_length: FieldKind::F32,
    hertz: FieldKind::F32,
    damping_ratio: FieldKind::F32,
    collide_connected: FieldKind::Bool,
    _pad0: FieldKind::Pad(3),
    magic: FieldKind::I32,
});

struct_layout!(pub static REVOLUTE_JOINT_DEF: GrRevoluteJointDef {
    body_a: FieldKind::Struct(&BODY_ID),
    body_b: FieldKind::Struct(&BODY_ID),
    local_anchor_a: FieldKind::Struct(&VEC2),
    local_anchor_b: FieldKind::Struct(&VEC2),
    reference_angle: FieldKind::F32,
    lower_angle: FieldKind::F32,
    upper_angle: FieldKind::F32,
    motor_speed: FieldKind::F32,
    max_motor_torque: FieldKind::F32,
    enable_limit: FieldKind::Bool,
    enable_motor: FieldKind::Bool,
    collide_connected: FieldKind::Bool,
    _pad0: FieldKind::Pad(1),
    magic: FieldKind::I32,
});

struct_layout!(pub static CONTACT_BEGIN_TOUCH_EVENT: GrContactBeginTouchEvent {
    shape_a: FieldKind::Struct(&SHAPE_ID),
    shape_b: FieldKind::Struct(&SHAPE_ID),
});

struct_layout!(pub static CONTACT_END_TOUCH_EVENT: GrContactEndTouchEvent {
    shape_a: FieldKind::Struct(&SHAPE_ID),
    shape_b: FieldKind::Struct(&SHAPE_ID),
});

struct_layout!(pub static CONTACT_HIT_EVENT: GrContactHitEvent {
    shape_a: FieldKind::Struct(&SHAPE_ID),
    shape_b: FieldKind::Struct(&SHAPE_ID),
    point: FieldKind::Struct(&VEC2),
    normal: FieldKind::Struct(&VEC2),
    approach_speed: FieldKind::F32,
});

struct_layout!(pub static SENSOR_BEGIN_TOUCH_EVENT: GrSensorBeginTouchEvent {
    sensor_shape: FieldKind::Struct(&SHAPE_ID),
    visitor_shape: FieldKind::Struct(&SHAPE_ID),
});

struct_layout!(pub static SENSOR_END_TOUCH_EVENT: GrSensorEndTouchEvent {
    sensor_shape: FieldKind::Struct(&SHAPE_ID),
    visitor_shape: FieldKind::Struct(&SHAPE_ID),
});

struct_layout!(pub static BODY_MOVE_EVENT: GrBodyMoveEvent {
    transform: FieldKind::Struct(&TRANSFORM),
    body: FieldKind::Struct(&BODY_ID),
    fell_asleep: FieldKind::Bool,
    _pad0: FieldKind::Pad(3),
});

/// Every descriptor, for blanket consistency tests.
pub static ALL: &[&StructLayout] = &[
    &VEC2,
    &ROT,
    &TRANSFORM,
    &AABB,
    &FILTER,
    &WORLD_ID,
    &BODY_ID,
    &SHAPE_ID,
    &JOINT_ID,
    &CHAIN_ID,
    &CIRCLE,
    &SEGMENT,
    &POLYGON,
    &MANIFOLD_POINT,
    &MANIFOLD,
    &WORLD_DEF,
    &BODY_DEF,
    &SHAPE_DEF,
    &CHAIN_DEF,
    &DISTANCE_JOINT_DEF,
    &REVOLUTE_JOINT_DEF,
    &CONTACT_BEGIN_TOUCH_EVENT,
    &CONTACT_END_TOUCH_EVENT,
    &CONTACT_HIT_EVENT,
    &SENSOR_BEGIN_TOUCH_EVENT,
    &SENSOR_END_TOUCH_EVENT,
    &BODY_MOVE_EVENT,
];
