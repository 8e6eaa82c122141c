//! Handle semantics.
//!
//! Every native object is addressed by a small generational handle: a
//! 1-based slot index, the owning world's slot, and a generation counter
//! bumped each time the slot is recycled. The all-zero value is the null
//! handle for every kind.
//!
//! The contract:
//! - A handle is valid from creation until its slot is recycled; after that
//!   it is stale and every ABI call with it reports invalid/default results.
//! - The only authoritative liveness check is the native `*_is_valid` call
//!   (`World::is_valid`, `Body::is_valid`, …). Registry presence never
//!   implies liveness, and wrappers hold handles, not liveness.
//! - Handles compare field-wise; their packed form
//!   ([`BodyId::to_key`] and friends) keys the identity registry.

pub use crate::ffi::types::GrBodyId as BodyId;
pub use crate::ffi::types::GrChainId as ChainId;
pub use crate::ffi::types::GrJointId as JointId;
pub use crate::ffi::types::GrShapeId as ShapeId;
pub use crate::ffi::types::GrWorldId as WorldId;
