//! `#[repr(C)]` mirrors of the Granite ABI.
//!
//! Every struct here must match the native layout byte-for-byte: field order,
//! widths, and padding are part of the contract. Padding is always spelled out
//! as `_pad*` fields so the Rust definition has no compiler-inserted bytes and
//! the value types can derive [`bytemuck::Pod`]. Sizes are pinned at compile
//! time with `static_assertions`; field offsets are pinned against the layout
//! descriptors in `layout::tests`.
//!
//! Booleans cross the boundary as `u8` (C `_Bool` is one byte, but `bool` is
//! not `Pod`); the wrapper layer converts at the edge.

use std::os::raw::c_void;

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;

/// Cookie stamped into every definition struct by its `default()` constructor.
/// The native side rejects definitions without it; passing a zeroed or
/// hand-rolled struct is the most common embedder mistake this catches.
pub const GR_DEF_MAGIC: i32 = 0x4752_4e44;

/// Upper bound on polygon vertices, fixed by the native ABI.
pub const GR_MAX_POLYGON_VERTS: usize = 8;

// --- Math value types ---

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct GrVec2 {
    pub x: f32,
    pub y: f32,
}

impl GrVec2 {
    pub const ZERO: GrVec2 = GrVec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        GrVec2 { x, y }
    }
}

impl From<glam::Vec2> for GrVec2 {
    fn from(v: glam::Vec2) -> Self {
        GrVec2 { x: v.x, y: v.y }
    }
}

impl From<GrVec2> for glam::Vec2 {
    fn from(v: GrVec2) -> Self {
        glam::Vec2::new(v.x, v.y)
    }
}

/// Rotation as a unit complex number, the native representation.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct GrRot {
    /// cosine
    pub c: f32,
    /// sine
    pub s: f32,
}

impl GrRot {
    pub const IDENTITY: GrRot = GrRot { c: 1.0, s: 0.0 };

    pub fn from_angle(radians: f32) -> Self {
        GrRot {
            c: radians.cos(),
            s: radians.sin(),
        }
    }

    pub fn angle(&self) -> f32 {
        self.s.atan2(self.c)
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct GrTransform {
    pub p: GrVec2,
    pub q: GrRot,
}

impl GrTransform {
    pub const IDENTITY: GrTransform = GrTransform {
        p: GrVec2::ZERO,
        q: GrRot::IDENTITY,
    };
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct GrAabb {
    pub lower: GrVec2,
    pub upper: GrVec2,
}

impl GrAabb {
    pub fn overlaps(&self, other: &GrAabb) -> bool {
        self.lower.x <= other.upper.x
            && self.lower.y <= other.upper.y
            && other.lower.x <= self.upper.x
            && other.lower.y <= self.upper.y
    }
}

/// Collision filter, applied before the custom-filter upcall.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct GrFilter {
    pub category_bits: u64,
    pub mask_bits: u64,
    pub group_index: i32,
    pub _pad0: u32,
}

impl Default for GrFilter {
    fn default() -> Self {
        GrFilter {
            category_bits: 1,
            mask_bits: u64::MAX,
            group_index: 0,
            _pad0: 0,
        }
    }
}

impl GrFilter {
    /// Native pair acceptance: same positive group always collides, same
    /// negative group never, otherwise category/mask in both directions.
    pub fn should_collide(&self, other: &GrFilter) -> bool {
        if self.group_index == other.group_index && self.group_index != 0 {
            return self.group_index > 0;
        }
        (self.category_bits & other.mask_bits) != 0 && (other.category_bits & self.mask_bits) != 0
    }
}

// --- Handle/ID values ---
//
// Slot indices are 1-based on the wire; the all-zero value is the null handle.
// A handle is valid only while its slot keeps the generation it was issued
// with; the only authoritative liveness check is the native `*_is_valid` call.

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct GrWorldId {
    pub index: u16,
    pub generation: u16,
}

impl GrWorldId {
    pub const NULL: GrWorldId = GrWorldId {
        index: 0,
        generation: 0,
    };

    pub fn is_null(&self) -> bool {
        self.index == 0
    }
}

macro_rules! owned_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[repr(C)]
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Pod, Zeroable)]
        pub struct $name {
            /// 1-based slot index in the owning world's pool.
            pub index: i32,
            /// Owning world slot (the owner tag).
            pub world: u16,
            /// Slot generation at issue time.
            pub generation: u16,
        }

        impl $name {
            pub const NULL: $name = $name {
                index: 0,
                world: 0,
                generation: 0,
            };

            pub fn is_null(&self) -> bool {
                self.index == 0
            }

            /// Packed registry key. Injective over (index, world, generation).
            pub fn to_key(&self) -> u64 {
                ((self.index as u32 as u64) << 32)
                    | ((self.world as u64) << 16)
                    | self.generation as u64
            }
        }
    };
}

owned_id!(
    /// Identifies a rigid body.
    GrBodyId
);
owned_id!(
    /// Identifies a shape attached to a body.
    GrShapeId
);
owned_id!(
    /// Identifies a joint.
    GrJointId
);
owned_id!(
    /// Identifies a chain.
    GrChainId
);

// --- Geometry ---

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct GrCircle {
    pub center: GrVec2,
    pub radius: f32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct GrSegment {
    pub point1: GrVec2,
    pub point2: GrVec2,
}

/// Convex polygon with fixed-capacity vertex storage. Only the first `count`
/// vertices/normals are meaningful.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct GrPolygon {
    pub vertices: [GrVec2; GR_MAX_POLYGON_VERTS],
    pub normals: [GrVec2; GR_MAX_POLYGON_VERTS],
    pub centroid: GrVec2,
    pub radius: f32,
    pub count: i32,
}

impl GrPolygon {
    /// Axis-aligned box centered at the origin with the given half extents.
    pub fn make_box(half_width: f32, half_height: f32) -> Self {
        let mut p = GrPolygon::zeroed();
        p.vertices[0] = GrVec2::new(-half_width, -half_height);
        p.vertices[1] = GrVec2::new(half_width, -half_height);
        p.vertices[2] = GrVec2::new(half_width, half_height);
        p.vertices[3] = GrVec2::new(-half_width, half_height);
        p.normals[0] = GrVec2::new(0.0, -1.0);
        p.normals[1] = GrVec2::new(1.0, 0.0);
        p.normals[2] = GrVec2::new(0.0, 1.0);
        p.normals[3] = GrVec2::new(-1.0, 0.0);
        p.centroid = GrVec2::ZERO;
        p.radius = 0.0;
        p.count = 4;
        p
    }
}

// --- Contact manifold (read-only inside pre-solve upcalls) ---

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct GrManifoldPoint {
    pub point: GrVec2,
    pub separation: f32,
    pub normal_impulse: f32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct GrManifold {
    pub points: [GrManifoldPoint; 2],
    pub normal: GrVec2,
    pub point_count: i32,
    pub _pad0: u32,
}

// --- Upcall signatures ---

/// Pair-filter upcall. May run on a native worker thread during the step;
/// implementations must not touch managed registry state.
pub type GrCustomFilterFn =
    unsafe extern "C" fn(shape_a: GrShapeId, shape_b: GrShapeId, context: *mut c_void) -> bool;

/// Pre-solve upcall. Same threading contract as [`GrCustomFilterFn`].
pub type GrPreSolveFn = unsafe extern "C" fn(
    shape_a: GrShapeId,
    shape_b: GrShapeId,
    manifold: *const GrManifold,
    context: *mut c_void,
) -> bool;

/// A unit of native work: process items `[start, end)` on the given worker.
pub type GrTaskFn =
    unsafe extern "C" fn(start: i32, end: i32, worker_index: u32, task_context: *mut c_void);

/// Hand a task to the embedder's scheduler. Returns an opaque task handle
/// passed back to [`GrFinishTaskFn`]. Every item in `[0, item_count)` must be
/// executed exactly once, in ranges no smaller than `min_range` (except the
/// tail).
pub type GrEnqueueTaskFn = unsafe extern "C" fn(
    task: GrTaskFn,
    item_count: i32,
    min_range: i32,
    task_context: *mut c_void,
    user_context: *mut c_void,
) -> *mut c_void;

/// Block until the task previously returned by the enqueue upcall completes.
pub type GrFinishTaskFn = unsafe extern "C" fn(task_handle: *mut c_void, user_context: *mut c_void);

// --- Definitions ---
//
// The native side clones definition structs during creation calls, so they
// may live on the stack and be reused or discarded immediately after.

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct GrWorldDef {
    pub gravity: GrVec2,
    pub restitution_threshold: f32,
    pub contact_hertz: f32,
    pub contact_damping_ratio: f32,
    pub maximum_linear_speed: f32,
    pub worker_count: i32,
    pub enable_sleep: u8,
    pub enable_continuous: u8,
    pub _pad0: [u8; 2],
    pub enqueue_task: Option<GrEnqueueTaskFn>,
    pub finish_task: Option<GrFinishTaskFn>,
    pub user_task_context: *mut c_void,
    pub magic: i32,
    pub _pad1: [u8; 4],
}

impl Default for GrWorldDef {
    fn default() -> Self {
        GrWorldDef {
            gravity: GrVec2::new(0.0, -10.0),
            restitution_threshold: 1.0,
            contact_hertz: 30.0,
            contact_damping_ratio: 10.0,
            maximum_linear_speed: 400.0,
            worker_count: 0,
            enable_sleep: 1,
            enable_continuous: 1,
            _pad0: [0; 2],
            enqueue_task: None,
            finish_task: None,
            user_task_context: std::ptr::null_mut(),
            magic: GR_DEF_MAGIC,
            _pad1: [0; 4],
        }
    }
}

#[repr(i32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GrBodyType {
    Static = 0,
    Kinematic = 1,
    Dynamic = 2,
}

impl GrBodyType {
    /// Maps the raw ABI discriminant; unknown values read as `Static`.
    pub fn from_raw(raw: i32) -> GrBodyType {
        match raw {
            1 => GrBodyType::Kinematic,
            2 => GrBodyType::Dynamic,
            _ => GrBodyType::Static,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct GrBodyDef {
    pub body_type: GrBodyType,
    pub position: GrVec2,
    pub rotation: GrRot,
    pub linear_velocity: GrVec2,
    pub angular_velocity: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub gravity_scale: f32,
    pub sleep_threshold: f32,
    pub enable_sleep: u8,
    pub is_awake: u8,
    pub fixed_rotation: u8,
    pub is_bullet: u8,
    pub is_enabled: u8,
    pub _pad0: [u8; 3],
    pub magic: i32,
}

impl Default for GrBodyDef {
    fn default() -> Self {
        GrBodyDef {
            body_type: GrBodyType::Static,
            position: GrVec2::ZERO,
            rotation: GrRot::IDENTITY,
            linear_velocity: GrVec2::ZERO,
            angular_velocity: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            gravity_scale: 1.0,
            sleep_threshold: 0.05,
            enable_sleep: 1,
            is_awake: 1,
            fixed_rotation: 0,
            is_bullet: 0,
            is_enabled: 1,
            _pad0: [0; 3],
            magic: GR_DEF_MAGIC,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct GrShapeDef {
    pub filter: GrFilter,
    pub friction: f32,
    pub restitution: f32,
    pub density: f32,
    pub is_sensor: u8,
    pub enable_sensor_events: u8,
    pub enable_contact_events: u8,
    pub enable_hit_events: u8,
    pub enable_pre_solve_events: u8,
    pub _pad0: [u8; 3],
    pub magic: i32,
}

impl Default for GrShapeDef {
    fn default() -> Self {
        GrShapeDef {
            filter: GrFilter::default(),
            friction: 0.6,
            restitution: 0.0,
            density: 1.0,
            is_sensor: 0,
            enable_sensor_events: 1,
            enable_contact_events: 1,
            enable_hit_events: 0,
            enable_pre_solve_events: 0,
            _pad0: [0; 3],
            magic: GR_DEF_MAGIC,
        }
    }
}

/// Chain definition. `points` is borrowed for the duration of the creation
/// call only; the native side copies it.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct GrChainDef {
    pub points: *const GrVec2,
    pub count: i32,
    pub friction: f32,
    pub restitution: f32,
    pub _pad0: [u8; 4],
    pub filter: GrFilter,
    pub is_loop: u8,
    pub _pad1: [u8; 3],
    pub magic: i32,
}

impl Default for GrChainDef {
    fn default() -> Self {
        GrChainDef {
            points: std::ptr::null(),
            count: 0,
            friction: 0.6,
            restitution: 0.0,
            _pad0: [0; 4],
            filter: GrFilter::default(),
            is_loop: 0,
            _pad1: [0; 3],
            magic: GR_DEF_MAGIC,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct GrDistanceJointDef {
    pub body_a: GrBodyId,
    pub body_b: GrBodyId,
    pub local_anchor_a: GrVec2,
    pub local_anchor_b: GrVec2,
    pub length: f32,
    pub min_length: f32,
    pub max_length: f32,
    pub hertz: f32,
    pub damping_ratio: f32,
    pub collide_connected: u8,
    pub _pad0: [u8; 3],
    pub magic: i32,
}

impl Default for GrDistanceJointDef {
    fn default() -> Self {
        GrDistanceJointDef {
            body_a: GrBodyId::NULL,
            body_b: GrBodyId::NULL,
            local_anchor_a: GrVec2::ZERO,
            local_anchor_b: GrVec2::ZERO,
            length: 1.0,
            min_length: 0.0,
            max_length: f32::MAX,
            hertz: 0.0,
            damping_ratio: 0.0,
            collide_connected: 0,
            _pad0: [0; 3],
            magic: GR_DEF_MAGIC,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct GrRevoluteJointDef {
    pub body_a: GrBodyId,
    pub body_b: GrBodyId,
    pub local_anchor_a: GrVec2,
    pub local_anchor_b: GrVec2,
    pub reference_angle: f32,
    pub lower_angle: f32,
    pub upper_angle: f32,
    pub motor_speed: f32,
    pub max_motor_torque: f32,
    pub enable_limit: u8,
    pub enable_motor: u8,
    pub collide_connected: u8,
    pub _pad0: u8,
    pub magic: i32,
}

impl Default for GrRevoluteJointDef {
    fn default() -> Self {
        GrRevoluteJointDef {
            body_a: GrBodyId::NULL,
            body_b: GrBodyId::NULL,
            local_anchor_a: GrVec2::ZERO,
            local_anchor_b: GrVec2::ZERO,
            reference_angle: 0.0,
            lower_angle: 0.0,
            upper_angle: 0.0,
            motor_speed: 0.0,
            max_motor_torque: 0.0,
            enable_limit: 0,
            enable_motor: 0,
            collide_connected: 0,
            _pad0: 0,
            magic: GR_DEF_MAGIC,
        }
    }
}

// --- Event records ---
//
// Records live in native-owned buffers valid only until the next step call.

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct GrContactBeginTouchEvent {
    pub shape_a: GrShapeId,
    pub shape_b: GrShapeId,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct GrContactEndTouchEvent {
    pub shape_a: GrShapeId,
    pub shape_b: GrShapeId,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct GrContactHitEvent {
    pub shape_a: GrShapeId,
    pub shape_b: GrShapeId,
    pub point: GrVec2,
    pub normal: GrVec2,
    pub approach_speed: f32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct GrSensorBeginTouchEvent {
    pub sensor_shape: GrShapeId,
    pub visitor_shape: GrShapeId,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct GrSensorEndTouchEvent {
    pub sensor_shape: GrShapeId,
    pub visitor_shape: GrShapeId,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct GrBodyMoveEvent {
    pub transform: GrTransform,
    pub body: GrBodyId,
    pub fell_asleep: u8,
    pub _pad0: [u8; 3],
}

// --- Event buffer descriptors ---
//
// (pointer, count) pairs handed out by the per-step event queries. No
// ownership transfer; the memory is recycled by the next step call.

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct GrContactEvents {
    pub begin_events: *const GrContactBeginTouchEvent,
    pub end_events: *const GrContactEndTouchEvent,
    pub hit_events: *const GrContactHitEvent,
    pub begin_count: i32,
    pub end_count: i32,
    pub hit_count: i32,
    pub _pad0: i32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct GrSensorEvents {
    pub begin_events: *const GrSensorBeginTouchEvent,
    pub end_events: *const GrSensorEndTouchEvent,
    pub begin_count: i32,
    pub end_count: i32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct GrBodyEvents {
    pub move_events: *const GrBodyMoveEvent,
    pub move_count: i32,
    pub _pad0: i32,
}

// --- ABI size pins ---

const_assert_eq!(std::mem::size_of::<GrVec2>(), 8);
const_assert_eq!(std::mem::size_of::<GrRot>(), 8);
const_assert_eq!(std::mem::size_of::<GrTransform>(), 16);
const_assert_eq!(std::mem::size_of::<GrAabb>(), 16);
const_assert_eq!(std::mem::size_of::<GrFilter>(), 24);
const_assert_eq!(std::mem::size_of::<GrWorldId>(), 4);
const_assert_eq!(std::mem::size_of::<GrBodyId>(), 8);
const_assert_eq!(std::mem::size_of::<GrShapeId>(), 8);
const_assert_eq!(std::mem::size_of::<GrJointId>(), 8);
const_assert_eq!(std::mem::size_of::<GrChainId>(), 8);
const_assert_eq!(std::mem::size_of::<GrCircle>(), 12);
const_assert_eq!(std::mem::size_of::<GrSegment>(), 16);
const_assert_eq!(std::mem::size_of::<GrPolygon>(), 144);
const_assert_eq!(std::mem::size_of::<GrManifold>(), 48);
const_assert_eq!(std::mem::size_of::<GrWorldDef>(), 64);
const_assert_eq!(std::mem::size_of::<GrBodyDef>(), 60);
const_assert_eq!(std::mem::size_of::<GrShapeDef>(), 48);
const_assert_eq!(std::mem::size_of::<GrChainDef>(), 56);
const_assert_eq!(std::mem::size_of::<GrDistanceJointDef>(), 60);
const_assert_eq!(std::mem::size_of::<GrRevoluteJointDef>(), 60);
const_assert_eq!(std::mem::size_of::<GrContactBeginTouchEvent>(), 16);
const_assert_eq!(std::mem::size_of::<GrContactHitEvent>(), 36);
const_assert_eq!(std::mem::size_of::<GrBodyMoveEvent>(), 28);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_key_is_injective_over_fields() {
        let a = GrBodyId {
            index: 7,
            world: 1,
            generation: 2,
        };
        let b = GrBodyId {
            index: 7,
            world: 1,
            generation: 3,
        };
        let c = GrBodyId {
            index: 7,
            world: 2,
            generation: 2,
        };
        assert_ne!(a.to_key(), b.to_key());
        assert_ne!(a.to_key(), c.to_key());
        assert_eq!(a.to_key(), a.to_key());
    }

    #[test]
    fn null_ids() {
        assert!(GrBodyId::NULL.is_null());
        assert!(GrWorldId::NULL.is_null());
        assert!(!GrShapeId {
            index: 1,
            world: 0,
            generation: 0
        }
        .is_null());
    }

    #[test]
    fn make_box_winding() {
        let p = GrPolygon::make_box(2.0, 1.0);
        assert_eq!(p.count, 4);
        assert_eq!(p.vertices[0], GrVec2::new(-2.0, -1.0));
        assert_eq!(p.vertices[2], GrVec2::new(2.0, 1.0));
        // CCW winding: normals point outward
        assert_eq!(p.normals[1], GrVec2::new(1.0, 0.0));
    }

    #[test]
    fn defaults_carry_the_cookie() {
        assert_eq!(GrWorldDef::default().magic, GR_DEF_MAGIC);
        assert_eq!(GrBodyDef::default().magic, GR_DEF_MAGIC);
        assert_eq!(GrShapeDef::default().magic, GR_DEF_MAGIC);
        assert_eq!(GrChainDef::default().magic, GR_DEF_MAGIC);
        assert_eq!(GrDistanceJointDef::default().magic, GR_DEF_MAGIC);
        assert_eq!(GrRevoluteJointDef::default().magic, GR_DEF_MAGIC);
    }

    #[test]
    fn filter_pair_logic() {
        let a = GrFilter::default();
        let b = GrFilter::default();
        assert!(a.should_collide(&b));

        let mut c = GrFilter::default();
        c.category_bits = 2;
        let mut d = GrFilter::default();
        d.mask_bits = !2;
        assert!(!c.should_collide(&d));

        let mut e = GrFilter::default();
        e.group_index = -3;
        let mut f = GrFilter::default();
        f.group_index = -3;
        assert!(!e.should_collide(&f));
    }
}
