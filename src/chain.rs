//! The chain wrapper: a loop or strip of segment shapes owned by one body.

use std::mem;
use std::rc::Rc;

use crate::ffi::types::{GrChainId, GrShapeId};
use crate::shape::Shape;
use crate::world::WorldCore;

pub struct Chain {
    id: GrChainId,
    world: Rc<WorldCore>,
}

impl Chain {
    pub(crate) fn from_handle(world: Rc<WorldCore>, id: GrChainId) -> Chain {
        Chain { id, world }
    }

    pub fn id(&self) -> GrChainId {
        self.id
    }

    pub fn is_valid(&self) -> bool {
        unsafe { (self.world.api.chain_is_valid)(self.id) }
    }

    pub fn segment_count(&self) -> usize {
        unsafe { (self.world.api.chain_segment_count)(self.id) }.max(0) as usize
    }

    /// The chain's segment shapes, as registered wrappers.
    pub fn segments(&self) -> Vec<Rc<Shape>> {
        self.segment_ids()
            .into_iter()
            .map(|id| self.world.resolve_shape(id))
            .collect()
    }

    fn segment_ids(&self) -> Vec<GrShapeId> {
        let capacity = self.segment_count();
        if capacity == 0 {
            return Vec::new();
        }
        let mut scratch = self.world.scratch.borrow_mut();
        scratch.reset();
        let region = scratch.alloc(capacity * mem::size_of::<GrShapeId>());
        let out = region.as_mut_ptr() as *mut GrShapeId;
        let written =
            unsafe { (self.world.api.chain_get_segments)(self.id, out, capacity as i32) }.max(0);
        let written = (written as usize).min(capacity);
        unsafe { std::slice::from_raw_parts(out, written) }.to_vec()
    }

    /// Destroys the native chain and its segments, unregistering any segment
    /// wrappers that were materialized.
    pub fn destroy(&self) {
        let segment_ids = self.segment_ids();
        {
            let mut registry = self.world.registry.borrow_mut();
            for sid in segment_ids {
                let key = sid.to_key();
                registry.shapes.unregister(key);
                registry.take_shape_payload(key);
            }
            registry.chains.unregister(self.id.to_key());
        }
        unsafe { (self.world.api.chain_destroy)(self.id) };
    }
}
