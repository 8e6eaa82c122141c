//! The collision shape wrapper.
//!
//! Shapes are the handle kind most often materialized transiently: event
//! records and bulk queries surface shape handles for objects the embedder
//! never wrapped explicitly. User payloads therefore live in the registry's
//! side table rather than on the wrapper, keyed by the packed handle.

use std::any::Any;
use std::rc::Rc;

use glam::Vec2;

use crate::body::Body;
use crate::ffi::types::{GrFilter, GrShapeId};
use crate::views::Aabb;
use crate::world::WorldCore;

pub struct Shape {
    id: GrShapeId,
    world: Rc<WorldCore>,
}

impl Shape {
    pub(crate) fn from_handle(world: Rc<WorldCore>, id: GrShapeId) -> Shape {
        Shape { id, world }
    }

    pub fn id(&self) -> GrShapeId {
        self.id
    }

    pub fn is_valid(&self) -> bool {
        unsafe { (self.world.api.shape_is_valid)(self.id) }
    }

    /// The owning body, resolved through the registry.
    pub fn body(&self) -> Option<Rc<Body>> {
        let id = unsafe { (self.world.api.shape_get_body)(self.id) };
        if id.is_null() {
            return None;
        }
        Some(self.world.resolve_body(id))
    }

    pub fn is_sensor(&self) -> bool {
        unsafe { (self.world.api.shape_is_sensor)(self.id) }
    }

    pub fn filter(&self) -> GrFilter {
        unsafe { (self.world.api.shape_get_filter)(self.id) }
    }

    pub fn set_filter(&self, filter: GrFilter) {
        unsafe { (self.world.api.shape_set_filter)(self.id, filter) }
    }

    /// Current world-space bounding box.
    pub fn aabb(&self) -> Aabb {
        let aabb = unsafe { (self.world.api.shape_get_aabb)(self.id) };
        Aabb {
            lower: aabb.lower.into(),
            upper: aabb.upper.into(),
        }
    }

    pub fn test_point(&self, point: Vec2) -> bool {
        unsafe { (self.world.api.shape_test_point)(self.id, point.into()) }
    }

    // --- User payload (registry side table) ---

    pub fn set_user_data(&self, data: Option<Box<dyn Any>>) {
        self.world
            .registry
            .borrow_mut()
            .set_shape_payload(self.id.to_key(), data);
    }

    pub fn with_user_data<R>(&self, f: impl FnOnce(Option<&dyn Any>) -> R) -> R {
        self.world
            .registry
            .borrow()
            .with_shape_payload(self.id.to_key(), f)
    }

    pub fn take_user_data(&self) -> Option<Box<dyn Any>> {
        self.world
            .registry
            .borrow_mut()
            .take_shape_payload(self.id.to_key())
    }

    /// Destroys the native shape and removes the wrapper and its payload
    /// from the registry.
    pub fn destroy(&self) {
        {
            let mut registry = self.world.registry.borrow_mut();
            registry.shapes.unregister(self.id.to_key());
            registry.take_shape_payload(self.id.to_key());
        }
        unsafe { (self.world.api.shape_destroy)(self.id) };
    }
}
