//! The rigid body wrapper.
//!
//! A `Body` pairs one native body handle with the shared world core. It holds
//! no simulation state of its own: every getter and setter is a native call,
//! so a wrapper that outlives its slot simply starts reporting what the
//! native side reports for a stale handle ([`Body::is_valid`] is the
//! authoritative check).
//!
//! Payload slots: `internal` is reserved for this crate's own bookkeeping,
//! `user` belongs to the embedder. Neither ever crosses the native boundary.

use std::any::Any;
use std::cell::RefCell;
use std::mem;
use std::rc::Rc;

use glam::Vec2;
use log::debug;

use crate::chain::Chain;
use crate::error::{Error, Result};
use crate::ffi::types::{
    GrBodyId, GrBodyType, GrChainDef, GrCircle, GrJointId, GrPolygon, GrSegment, GrShapeDef,
    GrShapeId, GrVec2, GR_DEF_MAGIC,
};
use crate::joint::Joint;
use crate::shape::Shape;
use crate::views::Transform;
use crate::world::WorldCore;

/// Chain creation parameters. Unlike the raw definition this borrows the
/// point slice safely; it is staged into the native struct for the duration
/// of the creation call only.
pub struct ChainDef<'a> {
    pub points: &'a [GrVec2],
    pub filter: crate::ffi::types::GrFilter,
    pub friction: f32,
    pub restitution: f32,
    pub is_loop: bool,
}

impl<'a> ChainDef<'a> {
    pub fn new(points: &'a [GrVec2]) -> Self {
        let native = GrChainDef::default();
        ChainDef {
            points,
            filter: native.filter,
            friction: native.friction,
            restitution: native.restitution,
            is_loop: false,
        }
    }
}

pub struct Body {
    id: GrBodyId,
    world: Rc<WorldCore>,
    /// Chains created through this wrapper, tracked so `destroy` can
    /// unregister them (the ABI has no body-to-chain enumeration).
    chain_keys: RefCell<Vec<u64>>,
    internal: RefCell<Option<Box<dyn Any>>>,
    user: RefCell<Option<Box<dyn Any>>>,
}

impl Body {
    pub(crate) fn from_handle(world: Rc<WorldCore>, id: GrBodyId) -> Body {
        Body {
            id,
            world,
            chain_keys: RefCell::new(Vec::new()),
            internal: RefCell::new(None),
            user: RefCell::new(None),
        }
    }

    pub fn id(&self) -> GrBodyId {
        self.id
    }

    /// The only authoritative liveness check; registry presence is not one.
    pub fn is_valid(&self) -> bool {
        unsafe { (self.world.api.body_is_valid)(self.id) }
    }

    // --- State access ---

    pub fn position(&self) -> Vec2 {
        unsafe { (self.world.api.body_get_position)(self.id) }.into()
    }

    pub fn rotation(&self) -> crate::ffi::types::GrRot {
        unsafe { (self.world.api.body_get_rotation)(self.id) }
    }

    pub fn transform(&self) -> Transform {
        unsafe { (self.world.api.body_get_transform)(self.id) }.into()
    }

    pub fn set_transform(&self, transform: Transform) {
        unsafe {
            (self.world.api.body_set_transform)(
                self.id,
                transform.position.into(),
                transform.rotation,
            )
        }
    }

    pub fn linear_velocity(&self) -> Vec2 {
        unsafe { (self.world.api.body_get_linear_velocity)(self.id) }.into()
    }

    pub fn set_linear_velocity(&self, velocity: Vec2) {
        unsafe { (self.world.api.body_set_linear_velocity)(self.id, velocity.into()) }
    }

    pub fn angular_velocity(&self) -> f32 {
        unsafe { (self.world.api.body_get_angular_velocity)(self.id) }
    }

    pub fn set_angular_velocity(&self, velocity: f32) {
        unsafe { (self.world.api.body_set_angular_velocity)(self.id, velocity) }
    }

    pub fn apply_force(&self, force: Vec2, wake: bool) {
        unsafe { (self.world.api.body_apply_force_center)(self.id, force.into(), wake) }
    }

    pub fn apply_impulse(&self, impulse: Vec2, wake: bool) {
        unsafe { (self.world.api.body_apply_impulse_center)(self.id, impulse.into(), wake) }
    }

    pub fn body_type(&self) -> GrBodyType {
        GrBodyType::from_raw(unsafe { (self.world.api.body_get_type)(self.id) })
    }

    pub fn set_body_type(&self, body_type: GrBodyType) {
        unsafe { (self.world.api.body_set_type)(self.id, body_type as i32) }
    }

    pub fn mass(&self) -> f32 {
        unsafe { (self.world.api.body_get_mass)(self.id) }
    }

    pub fn is_awake(&self) -> bool {
        unsafe { (self.world.api.body_is_awake)(self.id) }
    }

    pub fn set_awake(&self, awake: bool) {
        unsafe { (self.world.api.body_set_awake)(self.id, awake) }
    }

    // --- Shape creation ---

    pub fn create_circle(&self, def: &GrShapeDef, circle: &GrCircle) -> Result<Rc<Shape>> {
        check_shape_def(def, "shape_create_circle")?;
        let id = unsafe { (self.world.api.shape_create_circle)(self.id, def, circle) };
        self.register_shape(id, "shape_create_circle")
    }

    pub fn create_polygon(&self, def: &GrShapeDef, polygon: &GrPolygon) -> Result<Rc<Shape>> {
        check_shape_def(def, "shape_create_polygon")?;
        let id = unsafe { (self.world.api.shape_create_polygon)(self.id, def, polygon) };
        self.register_shape(id, "shape_create_polygon")
    }

    pub fn create_segment(&self, def: &GrShapeDef, segment: &GrSegment) -> Result<Rc<Shape>> {
        check_shape_def(def, "shape_create_segment")?;
        let id = unsafe { (self.world.api.shape_create_segment)(self.id, def, segment) };
        self.register_shape(id, "shape_create_segment")
    }

    fn register_shape(&self, id: GrShapeId, op: &'static str) -> Result<Rc<Shape>> {
        if id.is_null() {
            return Err(Error::native(op));
        }
        let shape = Rc::new(Shape::from_handle(self.world.clone(), id));
        self.world
            .registry
            .borrow_mut()
            .shapes
            .register(id.to_key(), shape.clone());
        Ok(shape)
    }

    /// Creates a chain of segment shapes attached to this body.
    pub fn create_chain(&self, def: &ChainDef<'_>) -> Result<Rc<Chain>> {
        if def.points.len() < 2 {
            return Err(Error::InvalidDef { op: "chain_create" });
        }
        let native = GrChainDef {
            points: def.points.as_ptr(),
            count: def.points.len() as i32,
            friction: def.friction,
            restitution: def.restitution,
            filter: def.filter,
            is_loop: def.is_loop as u8,
            ..GrChainDef::default()
        };
        let id = unsafe { (self.world.api.chain_create)(self.id, &native) };
        if id.is_null() {
            return Err(Error::native("chain_create"));
        }
        let chain = Rc::new(Chain::from_handle(self.world.clone(), id));
        self.world
            .registry
            .borrow_mut()
            .chains
            .register(id.to_key(), chain.clone());
        self.chain_keys.borrow_mut().push(id.to_key());
        Ok(chain)
    }

    // --- Bulk enumeration ---

    pub fn shape_count(&self) -> usize {
        unsafe { (self.world.api.body_shape_count)(self.id) }.max(0) as usize
    }

    /// All shapes attached to this body, as registered wrappers.
    pub fn shapes(&self) -> Vec<Rc<Shape>> {
        self.shape_ids()
            .into_iter()
            .map(|id| self.world.resolve_shape(id))
            .collect()
    }

    pub fn joint_count(&self) -> usize {
        unsafe { (self.world.api.body_joint_count)(self.id) }.max(0) as usize
    }

    pub fn joints(&self) -> Vec<Rc<Joint>> {
        self.joint_ids()
            .into_iter()
            .map(|id| self.world.resolve_joint(id))
            .collect()
    }

    /// Raw bulk query through a scratch region sized from the count query.
    /// The native call clamps to the capacity it is given and reports the
    /// count actually written.
    pub(crate) fn shape_ids(&self) -> Vec<GrShapeId> {
        let capacity = self.shape_count();
        if capacity == 0 {
            return Vec::new();
        }
        let mut scratch = self.world.scratch.borrow_mut();
        scratch.reset();
        let region = scratch.alloc(capacity * mem::size_of::<GrShapeId>());
        let out = region.as_mut_ptr() as *mut GrShapeId;
        let written =
            unsafe { (self.world.api.body_get_shapes)(self.id, out, capacity as i32) }.max(0);
        let written = (written as usize).min(capacity);
        unsafe { std::slice::from_raw_parts(out, written) }.to_vec()
    }

    pub(crate) fn joint_ids(&self) -> Vec<GrJointId> {
        let capacity = self.joint_count();
        if capacity == 0 {
            return Vec::new();
        }
        let mut scratch = self.world.scratch.borrow_mut();
        scratch.reset();
        let region = scratch.alloc(capacity * mem::size_of::<GrJointId>());
        let out = region.as_mut_ptr() as *mut GrJointId;
        let written =
            unsafe { (self.world.api.body_get_joints)(self.id, out, capacity as i32) }.max(0);
        let written = (written as usize).min(capacity);
        unsafe { std::slice::from_raw_parts(out, written) }.to_vec()
    }

    // --- Payload slots ---

    pub fn set_user_data(&self, data: Option<Box<dyn Any>>) {
        *self.user.borrow_mut() = data;
    }

    pub fn with_user_data<R>(&self, f: impl FnOnce(Option<&dyn Any>) -> R) -> R {
        f(self.user.borrow().as_deref())
    }

    pub fn take_user_data(&self) -> Option<Box<dyn Any>> {
        self.user.borrow_mut().take()
    }

    pub(crate) fn set_internal_data(&self, data: Option<Box<dyn Any>>) {
        *self.internal.borrow_mut() = data;
    }

    pub(crate) fn with_internal_data<R>(&self, f: impl FnOnce(Option<&dyn Any>) -> R) -> R {
        f(self.internal.borrow().as_deref())
    }

    // --- Destruction ---

    /// Destroys the native body. The native side frees the body's shapes,
    /// chains and joints with it, so their registry entries are removed
    /// first; any wrappers the embedder still holds become stale.
    pub fn destroy(&self) {
        let shape_ids = self.shape_ids();
        let joint_ids = self.joint_ids();
        {
            let mut registry = self.world.registry.borrow_mut();
            for sid in shape_ids {
                let key = sid.to_key();
                registry.shapes.unregister(key);
                registry.take_shape_payload(key);
            }
            for jid in joint_ids {
                registry.joints.unregister(jid.to_key());
            }
            for key in self.chain_keys.borrow_mut().drain(..) {
                registry.chains.unregister(key);
            }
            registry.bodies.unregister(self.id.to_key());
        }
        unsafe { (self.world.api.body_destroy)(self.id) };
        debug!("destroyed body {}", self.id.index);
    }
}

fn check_shape_def(def: &GrShapeDef, op: &'static str) -> Result<()> {
    if def.magic != GR_DEF_MAGIC {
        return Err(Error::InvalidDef { op });
    }
    Ok(())
}

#[cfg(test)]
#[cfg(feature = "embedded-backend")]
mod tests {
    use super::*;
    use crate::ffi::types::GrBodyDef;
    use crate::ffi::NativeApi;
    use crate::world::{World, WorldDef};

    #[test]
    fn payload_slots_are_independent() {
        let world = World::create(NativeApi::embedded(), &WorldDef::default()).unwrap();
        let body = world.create_body(&GrBodyDef::default()).unwrap();

        body.set_user_data(Some(Box::new(41u32)));
        body.set_internal_data(Some(Box::new("bookkeeping")));

        body.with_user_data(|d| {
            assert_eq!(d.and_then(|a| a.downcast_ref::<u32>()), Some(&41));
        });
        body.with_internal_data(|d| {
            assert!(d.and_then(|a| a.downcast_ref::<&str>()).is_some());
        });

        assert!(body.take_user_data().is_some());
        body.with_user_data(|d| assert!(d.is_none()));
        body.with_internal_data(|d| assert!(d.is_some()));

        body.destroy();
        world.destroy();
    }

    #[test]
    fn uncookied_definition_is_rejected_before_the_native_call() {
        let world = World::create(NativeApi::embedded(), &WorldDef::default()).unwrap();
        let mut def = GrBodyDef::default();
        def.magic = 0;
        assert!(matches!(
            world.create_body(&def),
            Err(Error::InvalidDef { op: "body_create" })
        ));
        world.destroy();
    }
}
