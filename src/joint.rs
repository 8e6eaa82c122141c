//! The joint wrapper (distance and revolute joints).

use std::rc::Rc;

use crate::body::Body;
use crate::ffi::types::GrJointId;
use crate::world::WorldCore;

pub struct Joint {
    id: GrJointId,
    world: Rc<WorldCore>,
}

impl Joint {
    pub(crate) fn from_handle(world: Rc<WorldCore>, id: GrJointId) -> Joint {
        Joint { id, world }
    }

    pub fn id(&self) -> GrJointId {
        self.id
    }

    pub fn is_valid(&self) -> bool {
        unsafe { (self.world.api.joint_is_valid)(self.id) }
    }

    /// First attached body; `None` once the joint is stale.
    pub fn body_a(&self) -> Option<Rc<Body>> {
        let id = unsafe { (self.world.api.joint_get_body_a)(self.id) };
        if id.is_null() {
            return None;
        }
        Some(self.world.resolve_body(id))
    }

    pub fn body_b(&self) -> Option<Rc<Body>> {
        let id = unsafe { (self.world.api.joint_get_body_b)(self.id) };
        if id.is_null() {
            return None;
        }
        Some(self.world.resolve_body(id))
    }

    /// Destroys the native joint and unregisters the wrapper.
    pub fn destroy(&self) {
        self.world
            .registry
            .borrow_mut()
            .joints
            .unregister(self.id.to_key());
        unsafe { (self.world.api.joint_destroy)(self.id) };
    }
}
