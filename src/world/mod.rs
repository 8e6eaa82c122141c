//! The simulation world wrapper: root of the managed object graph.
//!
//! A [`World`] owns the native world handle, the per-world identity registry,
//! the registered listeners and upcalls, and the scratch arena for bulk
//! queries. Every other wrapper holds an `Rc` to the shared [`WorldCore`],
//! through which all native calls and all wrapper materialization flow.
//!
//! Destruction is explicit everywhere: dropping a wrapper, including the
//! `World` itself, never releases native resources. `World::destroy` tears
//! down the native world (which frees every body, shape, joint and chain in
//! it) and clears the registry; outstanding wrapper `Rc`s become stale, which
//! the native validity calls report faithfully.

pub mod events;

use std::cell::RefCell;
use std::os::raw::c_void;
use std::rc::Rc;
use std::sync::Arc;

use glam::Vec2;
use log::debug;

use crate::arena::Scope;
use crate::body::Body;
use crate::callbacks::{
    custom_filter_trampoline, enqueue_task_trampoline, finish_task_trampoline,
    pre_solve_trampoline, CustomFilter, PreSolve, WorkerPool,
};
use crate::error::{Error, Result};
use crate::ffi::types::{
    GrBodyId, GrDistanceJointDef, GrJointId, GrRevoluteJointDef, GrShapeId, GrWorldDef,
    GrWorldId, GR_DEF_MAGIC,
};
use crate::ffi::NativeApi;
use crate::joint::Joint;
use crate::registry::IdentityRegistry;
use crate::shape::Shape;
use events::{BodyListener, ContactListener, SensorListener};

/// Shared per-world state behind every wrapper.
pub(crate) struct WorldCore {
    pub(crate) api: Arc<NativeApi>,
    pub(crate) id: GrWorldId,
    pub(crate) registry: RefCell<IdentityRegistry>,
    /// Scratch storage for call-scoped temporaries (bulk-query output
    /// arrays). Reset at the start of each bulk call.
    pub(crate) scratch: RefCell<Scope>,
}

impl WorldCore {
    /// Returns the registered wrapper for `id`, materializing and registering
    /// a transient one on miss. Identity invariant: for one handle, every
    /// resolution returns the same `Rc`.
    pub(crate) fn resolve_body(self: &Rc<Self>, id: GrBodyId) -> Rc<Body> {
        debug_assert!(!id.is_null());
        let key = id.to_key();
        if let Some(body) = self.registry.borrow().bodies.lookup(key) {
            return body;
        }
        let body = Rc::new(Body::from_handle(self.clone(), id));
        self.registry.borrow_mut().bodies.register(key, body.clone());
        body
    }

    pub(crate) fn resolve_shape(self: &Rc<Self>, id: GrShapeId) -> Rc<Shape> {
        debug_assert!(!id.is_null());
        let key = id.to_key();
        if let Some(shape) = self.registry.borrow().shapes.lookup(key) {
            return shape;
        }
        let shape = Rc::new(Shape::from_handle(self.clone(), id));
        self.registry.borrow_mut().shapes.register(key, shape.clone());
        shape
    }

    pub(crate) fn resolve_joint(self: &Rc<Self>, id: GrJointId) -> Rc<Joint> {
        debug_assert!(!id.is_null());
        let key = id.to_key();
        if let Some(joint) = self.registry.borrow().joints.lookup(key) {
            return joint;
        }
        let joint = Rc::new(Joint::from_handle(self.clone(), id));
        self.registry.borrow_mut().joints.register(key, joint.clone());
        joint
    }

    /// Resolution for handles embedded in event records. Records can outlive
    /// the object they name: destroying a touching shape queues an end-touch
    /// for the next step. A miss is registered only while the native side
    /// still reports the handle live; a stale handle yields an unregistered
    /// transient wrapper, so draining never re-enters destroyed entries.
    pub(crate) fn resolve_event_shape(self: &Rc<Self>, id: GrShapeId) -> Rc<Shape> {
        debug_assert!(!id.is_null());
        let key = id.to_key();
        if let Some(shape) = self.registry.borrow().shapes.lookup(key) {
            return shape;
        }
        let shape = Rc::new(Shape::from_handle(self.clone(), id));
        if unsafe { (self.api.shape_is_valid)(id) } {
            self.registry.borrow_mut().shapes.register(key, shape.clone());
        }
        shape
    }

    pub(crate) fn resolve_event_body(self: &Rc<Self>, id: GrBodyId) -> Rc<Body> {
        debug_assert!(!id.is_null());
        let key = id.to_key();
        if let Some(body) = self.registry.borrow().bodies.lookup(key) {
            return body;
        }
        let body = Rc::new(Body::from_handle(self.clone(), id));
        if unsafe { (self.api.body_is_valid)(id) } {
            self.registry.borrow_mut().bodies.register(key, body.clone());
        }
        body
    }
}

/// World creation parameters, marshaled into the native definition struct.
pub struct WorldDef {
    pub gravity: Vec2,
    pub enable_sleep: bool,
    pub enable_continuous: bool,
    pub restitution_threshold: f32,
    /// Lend these threads to the native scheduler. The pool is held alive by
    /// the world for as long as the native side may call into it.
    pub workers: Option<Arc<WorkerPool>>,
}

impl Default for WorldDef {
    fn default() -> Self {
        let native = GrWorldDef::default();
        WorldDef {
            gravity: native.gravity.into(),
            enable_sleep: native.enable_sleep != 0,
            enable_continuous: native.enable_continuous != 0,
            restitution_threshold: native.restitution_threshold,
            workers: None,
        }
    }
}

/// Root wrapper over one native world.
///
/// Teardown is [`World::destroy`] and nothing else. Dropping a `World`
/// without calling it leaks both sides: the native world stays allocated,
/// and the managed graph stays reachable through the registry's `Rc` cycle
/// (the registry holds wrappers, wrappers hold the shared core).
pub struct World {
    core: Rc<WorldCore>,
    contact_listeners: Vec<Box<dyn ContactListener>>,
    sensor_listeners: Vec<Box<dyn SensorListener>>,
    body_listeners: Vec<Box<dyn BodyListener>>,
    // Double-boxed so the trampoline context (a pointer to the inner fat
    // Box) stays at a stable heap address.
    custom_filter: Option<Box<Box<dyn CustomFilter>>>,
    pre_solve: Option<Box<Box<dyn PreSolve>>>,
    workers: Option<Arc<WorkerPool>>,
}

impl World {
    /// Creates a native world and its managed wrapper.
    pub fn create(api: Arc<NativeApi>, def: &WorldDef) -> Result<World> {
        let mut native = GrWorldDef {
            gravity: def.gravity.into(),
            restitution_threshold: def.restitution_threshold,
            enable_sleep: def.enable_sleep as u8,
            enable_continuous: def.enable_continuous as u8,
            ..GrWorldDef::default()
        };
        if let Some(pool) = &def.workers {
            native.worker_count = pool.worker_count() as i32;
            native.enqueue_task = Some(enqueue_task_trampoline);
            native.finish_task = Some(finish_task_trampoline);
            native.user_task_context = Arc::as_ptr(pool) as *mut c_void;
        }

        let id = unsafe { (api.world_create)(&native) };
        if id.is_null() {
            return Err(Error::native("world_create"));
        }
        debug!("created world {}:{}", id.index, id.generation);
        Ok(World {
            core: Rc::new(WorldCore {
                api,
                id,
                registry: RefCell::new(IdentityRegistry::new()),
                scratch: RefCell::new(Scope::new()),
            }),
            contact_listeners: Vec::new(),
            sensor_listeners: Vec::new(),
            body_listeners: Vec::new(),
            custom_filter: None,
            pre_solve: None,
            workers: def.workers.clone(),
        })
    }

    pub fn id(&self) -> GrWorldId {
        self.core.id
    }

    pub fn is_valid(&self) -> bool {
        unsafe { (self.core.api.world_is_valid)(self.core.id) }
    }

    pub fn gravity(&self) -> Vec2 {
        unsafe { (self.core.api.world_get_gravity)(self.core.id) }.into()
    }

    pub fn set_gravity(&self, gravity: Vec2) {
        unsafe { (self.core.api.world_set_gravity)(self.core.id, gravity.into()) }
    }

    /// Advances the simulation and synchronously drains this step's event
    /// buffers into the registered listeners (contact, then sensor, then
    /// body). Event memory is native-owned and never retained past the drain.
    pub fn step(&mut self, time_step: f32, sub_step_count: i32) {
        unsafe { (self.core.api.world_step)(self.core.id, time_step, sub_step_count) };
        self.drain_events();
    }

    /// Creates a body from a definition. The definition must carry its
    /// default-initialized cookie; a zeroed struct is rejected up front.
    pub fn create_body(&self, def: &crate::ffi::types::GrBodyDef) -> Result<Rc<Body>> {
        if def.magic != GR_DEF_MAGIC {
            return Err(Error::InvalidDef { op: "body_create" });
        }
        let id = unsafe { (self.core.api.body_create)(self.core.id, def) };
        if id.is_null() {
            return Err(Error::native("body_create"));
        }
        let body = Rc::new(Body::from_handle(self.core.clone(), id));
        self.core
            .registry
            .borrow_mut()
            .bodies
            .register(id.to_key(), body.clone());
        debug!("created body {}", id.index);
        Ok(body)
    }

    pub fn create_distance_joint(&self, def: &GrDistanceJointDef) -> Result<Rc<Joint>> {
        if def.magic != GR_DEF_MAGIC {
            return Err(Error::InvalidDef {
                op: "joint_create_distance",
            });
        }
        let id = unsafe { (self.core.api.joint_create_distance)(self.core.id, def) };
        if id.is_null() {
            return Err(Error::native("joint_create_distance"));
        }
        Ok(self.register_joint(id))
    }

    pub fn create_revolute_joint(&self, def: &GrRevoluteJointDef) -> Result<Rc<Joint>> {
        if def.magic != GR_DEF_MAGIC {
            return Err(Error::InvalidDef {
                op: "joint_create_revolute",
            });
        }
        let id = unsafe { (self.core.api.joint_create_revolute)(self.core.id, def) };
        if id.is_null() {
            return Err(Error::native("joint_create_revolute"));
        }
        Ok(self.register_joint(id))
    }

    fn register_joint(&self, id: GrJointId) -> Rc<Joint> {
        let joint = Rc::new(Joint::from_handle(self.core.clone(), id));
        self.core
            .registry
            .borrow_mut()
            .joints
            .register(id.to_key(), joint.clone());
        debug!("created joint {}", id.index);
        joint
    }

    // --- Listeners ---

    pub fn add_contact_listener(&mut self, listener: Box<dyn ContactListener>) {
        self.contact_listeners.push(listener);
    }

    pub fn add_sensor_listener(&mut self, listener: Box<dyn SensorListener>) {
        self.sensor_listeners.push(listener);
    }

    pub fn add_body_listener(&mut self, listener: Box<dyn BodyListener>) {
        self.body_listeners.push(listener);
    }

    // --- Upcalls ---

    /// Installs (or replaces) the contact filter consulted by the native
    /// solver. The filter may be invoked from native worker threads.
    pub fn set_custom_filter(&mut self, filter: impl CustomFilter) {
        let slot: Box<Box<dyn CustomFilter>> = Box::new(Box::new(filter));
        let context = &*slot as *const Box<dyn CustomFilter> as *mut c_void;
        unsafe {
            (self.core.api.world_set_custom_filter)(
                self.core.id,
                Some(custom_filter_trampoline),
                context,
            )
        };
        self.custom_filter = Some(slot);
    }

    pub fn clear_custom_filter(&mut self) {
        unsafe {
            (self.core.api.world_set_custom_filter)(self.core.id, None, std::ptr::null_mut())
        };
        self.custom_filter = None;
    }

    pub fn set_pre_solve(&mut self, pre_solve: impl PreSolve) {
        let slot: Box<Box<dyn PreSolve>> = Box::new(Box::new(pre_solve));
        let context = &*slot as *const Box<dyn PreSolve> as *mut c_void;
        unsafe {
            (self.core.api.world_set_pre_solve)(self.core.id, Some(pre_solve_trampoline), context)
        };
        self.pre_solve = Some(slot);
    }

    pub fn clear_pre_solve(&mut self) {
        unsafe { (self.core.api.world_set_pre_solve)(self.core.id, None, std::ptr::null_mut()) };
        self.pre_solve = None;
    }

    /// Live registry entries across all kinds (diagnostics and tests).
    pub fn registered_wrappers(&self) -> usize {
        self.core.registry.borrow().live_entries()
    }

    /// Destroys the native world and everything in it, then clears the
    /// registry. Wrappers still held by the embedder become stale.
    pub fn destroy(self) {
        debug!("destroying world {}", self.core.id.index);
        self.core.registry.borrow_mut().clear();
        unsafe { (self.core.api.world_destroy)(self.core.id) };
        // `workers` drops after the native world: no further task upcalls
        // can arrive once the world is gone.
        drop(self.workers);
    }

    pub(crate) fn core(&self) -> &Rc<WorldCore> {
        &self.core
    }
}
