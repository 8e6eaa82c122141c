//! Native Call Bindings: the complete Granite entry-point table.
//!
//! Every native reach-out in the crate goes through exactly one slot of
//! [`NativeApi`]. The table is declared once in the `native_api!` invocation
//! below, which generates both constructors from the same list so they can
//! never drift:
//! - [`NativeApi::load`]: resolve every `gr_*` symbol from a shared library
//!   (eagerly — a missing symbol fails the load, never a call),
//! - [`NativeApi::embedded`]: the reference backend compiled into this crate
//!   (feature `embedded-backend`).
//!
//! Calling convention notes: handles are passed by value, definitions and
//! geometry by const pointer (the native side clones them), bulk queries take
//! a caller-sized output pointer and return the entry count actually written.

pub mod types;

#[cfg(feature = "embedded-backend")]
pub(crate) mod stub;

use std::ffi::OsStr;
use std::os::raw::c_void;
use std::sync::Arc;

use libloading::Library;
use log::debug;

use crate::error::{Error, Result};
use types::*;

macro_rules! native_api {
    ($( $(#[$meta:meta])* $field:ident: $sym:literal =
           fn($($arg:ty),* $(,)?) $(-> $ret:ty)?; )+) => {
        /// Typed function table over the native library.
        pub struct NativeApi {
            $( $(#[$meta])* pub $field: unsafe extern "C" fn($($arg),*) $(-> $ret)?, )+
            /// Keeps the dynamic library mapped for as long as any function
            /// pointer above may be called. `None` for the embedded backend.
            _library: Option<Library>,
        }

        impl NativeApi {
            /// Loads the native library and resolves every entry point.
            pub fn load(path: impl AsRef<OsStr>) -> Result<Arc<NativeApi>> {
                let library = unsafe { Library::new(path.as_ref()) }?;
                // Resolved into locals so every `Symbol` borrow ends before
                // the library moves into the table.
                $( let $field = unsafe {
                    *library
                        .get::<unsafe extern "C" fn($($arg),*) $(-> $ret)?>(
                            concat!($sym, "\0").as_bytes(),
                        )
                        .map_err(|_| Error::MissingSymbol { symbol: $sym })?
                }; )+
                debug!("loaded native library from {:?}", path.as_ref());
                Ok(Arc::new(NativeApi {
                    $( $field, )+
                    _library: Some(library),
                }))
            }

            /// The in-crate reference backend.
            #[cfg(feature = "embedded-backend")]
            pub fn embedded() -> Arc<NativeApi> {
                Arc::new(NativeApi {
                    $( $field: stub::$field, )+
                    _library: None,
                })
            }
        }
    };
}

native_api! {
    // World
    world_create: "gr_world_create" = fn(*const GrWorldDef) -> GrWorldId;
    world_destroy: "gr_world_destroy" = fn(GrWorldId);
    world_is_valid: "gr_world_is_valid" = fn(GrWorldId) -> bool;
    /// Synchronous; event buffers for the step are valid until the next call.
    world_step: "gr_world_step" = fn(GrWorldId, f32, i32);
    world_contact_events: "gr_world_contact_events" = fn(GrWorldId) -> GrContactEvents;
    world_sensor_events: "gr_world_sensor_events" = fn(GrWorldId) -> GrSensorEvents;
    world_body_events: "gr_world_body_events" = fn(GrWorldId) -> GrBodyEvents;
    world_set_gravity: "gr_world_set_gravity" = fn(GrWorldId, GrVec2);
    world_get_gravity: "gr_world_get_gravity" = fn(GrWorldId) -> GrVec2;
    world_set_custom_filter: "gr_world_set_custom_filter" =
        fn(GrWorldId, Option<GrCustomFilterFn>, *mut c_void);
    world_set_pre_solve: "gr_world_set_pre_solve" =
        fn(GrWorldId, Option<GrPreSolveFn>, *mut c_void);

    // Body
    body_create: "gr_body_create" = fn(GrWorldId, *const GrBodyDef) -> GrBodyId;
    body_destroy: "gr_body_destroy" = fn(GrBodyId);
    body_is_valid: "gr_body_is_valid" = fn(GrBodyId) -> bool;
    body_get_position: "gr_body_get_position" = fn(GrBodyId) -> GrVec2;
    body_get_rotation: "gr_body_get_rotation" = fn(GrBodyId) -> GrRot;
    body_get_transform: "gr_body_get_transform" = fn(GrBodyId) -> GrTransform;
    body_set_transform: "gr_body_set_transform" = fn(GrBodyId, GrVec2, GrRot);
    body_get_linear_velocity: "gr_body_get_linear_velocity" = fn(GrBodyId) -> GrVec2;
    body_set_linear_velocity: "gr_body_set_linear_velocity" = fn(GrBodyId, GrVec2);
    body_get_angular_velocity: "gr_body_get_angular_velocity" = fn(GrBodyId) -> f32;
    body_set_angular_velocity: "gr_body_set_angular_velocity" = fn(GrBodyId, f32);
    body_apply_force_center: "gr_body_apply_force_center" = fn(GrBodyId, GrVec2, bool);
    body_apply_impulse_center: "gr_body_apply_impulse_center" = fn(GrBodyId, GrVec2, bool);
    body_get_type: "gr_body_get_type" = fn(GrBodyId) -> i32;
    body_set_type: "gr_body_set_type" = fn(GrBodyId, i32);
    body_get_mass: "gr_body_get_mass" = fn(GrBodyId) -> f32;
    body_is_awake: "gr_body_is_awake" = fn(GrBodyId) -> bool;
    body_set_awake: "gr_body_set_awake" = fn(GrBodyId, bool);
    body_shape_count: "gr_body_shape_count" = fn(GrBodyId) -> i32;
    /// Bulk: writes at most `capacity` ids, returns the count written.
    body_get_shapes: "gr_body_get_shapes" = fn(GrBodyId, *mut GrShapeId, i32) -> i32;
    body_joint_count: "gr_body_joint_count" = fn(GrBodyId) -> i32;
    body_get_joints: "gr_body_get_joints" = fn(GrBodyId, *mut GrJointId, i32) -> i32;

    // Shape
    shape_create_circle: "gr_shape_create_circle" =
        fn(GrBodyId, *const GrShapeDef, *const GrCircle) -> GrShapeId;
    shape_create_polygon: "gr_shape_create_polygon" =
        fn(GrBodyId, *const GrShapeDef, *const GrPolygon) -> GrShapeId;
    shape_create_segment: "gr_shape_create_segment" =
        fn(GrBodyId, *const GrShapeDef, *const GrSegment) -> GrShapeId;
    shape_destroy: "gr_shape_destroy" = fn(GrShapeId);
    shape_is_valid: "gr_shape_is_valid" = fn(GrShapeId) -> bool;
    shape_get_body: "gr_shape_get_body" = fn(GrShapeId) -> GrBodyId;
    shape_is_sensor: "gr_shape_is_sensor" = fn(GrShapeId) -> bool;
    shape_get_filter: "gr_shape_get_filter" = fn(GrShapeId) -> GrFilter;
    shape_set_filter: "gr_shape_set_filter" = fn(GrShapeId, GrFilter);
    shape_get_aabb: "gr_shape_get_aabb" = fn(GrShapeId) -> GrAabb;
    shape_test_point: "gr_shape_test_point" = fn(GrShapeId, GrVec2) -> bool;

    // Chain
    chain_create: "gr_chain_create" = fn(GrBodyId, *const GrChainDef) -> GrChainId;
    chain_destroy: "gr_chain_destroy" = fn(GrChainId);
    chain_is_valid: "gr_chain_is_valid" = fn(GrChainId) -> bool;
    chain_segment_count: "gr_chain_segment_count" = fn(GrChainId) -> i32;
    chain_get_segments: "gr_chain_get_segments" = fn(GrChainId, *mut GrShapeId, i32) -> i32;

    // Joint
    joint_create_distance: "gr_joint_create_distance" =
        fn(GrWorldId, *const GrDistanceJointDef) -> GrJointId;
    joint_create_revolute: "gr_joint_create_revolute" =
        fn(GrWorldId, *const GrRevoluteJointDef) -> GrJointId;
    joint_destroy: "gr_joint_destroy" = fn(GrJointId);
    joint_is_valid: "gr_joint_is_valid" = fn(GrJointId) -> bool;
    joint_get_body_a: "gr_joint_get_body_a" = fn(GrJointId) -> GrBodyId;
    joint_get_body_b: "gr_joint_get_body_b" = fn(GrJointId) -> GrBodyId;
}

impl std::fmt::Debug for NativeApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeApi")
            .field(
                "backend",
                &if self._library.is_some() {
                    "dynamic"
                } else {
                    "embedded"
                },
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loading_a_missing_library_fails() {
        let err = NativeApi::load("/nonexistent/libgranite.so").unwrap_err();
        assert!(matches!(err, Error::LibraryLoad(_)));
    }

    #[cfg(feature = "embedded-backend")]
    #[test]
    fn embedded_backend_constructs() {
        let api = NativeApi::embedded();
        assert!(format!("{api:?}").contains("embedded"));
    }
}
