//! # granite2d
//!
//! Safe, identity-preserving Rust bindings to the Granite 2D rigid-body
//! simulation library. Granite is a closed native library reachable only
//! through its documented C entry points; this crate is the bridge, not the
//! physics.
//!
//! ## What the bridge guarantees
//!
//! - **Identity**: at most one live wrapper per native handle. Relationship
//!   queries and event records resolve to the *same* `Rc` the embedder
//!   already holds ([`registry`]).
//! - **Zero-copy marshaling**: native structs are described by layout
//!   descriptors ([`layout`]) and accessed in place through typed views
//!   ([`views`]); event buffers are walked where they sit, never copied
//!   ([`world::events`]).
//! - **Explicit lifetimes**: native resources die only on explicit
//!   `destroy()` calls; dropping a wrapper releases nothing. Stale handles
//!   are detected by the native validity calls, never guessed at.
//! - **Contained upcalls**: native-to-managed callbacks ([`callbacks`])
//!   receive raw handles, never wrappers, and panics are caught at the C
//!   boundary.
//!
//! ## Backends
//!
//! [`ffi::NativeApi::load`] resolves every `gr_*` symbol from a shared
//! library; with the `embedded-backend` feature (default), [`ffi::NativeApi::embedded`]
//! provides a headless reference implementation of the same ABI for CI and
//! deterministic fallback.
//!
//! ## Example
//!
//! ```no_run
//! use granite2d::{GrBodyDef, GrBodyType, GrCircle, GrShapeDef, GrVec2};
//! use granite2d::{NativeApi, World, WorldDef};
//!
//! # fn main() -> granite2d::Result<()> {
//! let api = NativeApi::embedded();
//! let mut world = World::create(api, &WorldDef::default())?;
//!
//! let mut body_def = GrBodyDef::default();
//! body_def.body_type = GrBodyType::Dynamic;
//! body_def.position = GrVec2::new(0.0, 4.0);
//! let body = world.create_body(&body_def)?;
//!
//! let circle = GrCircle { center: GrVec2::ZERO, radius: 0.5 };
//! body.create_circle(&GrShapeDef::default(), &circle)?;
//!
//! for _ in 0..60 {
//!     world.step(1.0 / 60.0, 4);
//! }
//! println!("{}", body.position());
//! # Ok(())
//! # }
//! ```

pub mod arena;
pub mod body;
pub mod callbacks;
pub mod chain;
pub mod error;
pub mod ffi;
pub mod handle;
pub mod joint;
pub mod layout;
pub(crate) mod registry;
pub mod shape;
pub mod views;
pub mod world;

pub use body::{Body, ChainDef};
pub use callbacks::{CustomFilter, PreSolve, WorkerPool};
pub use chain::Chain;
pub use error::{Error, Result};
pub use ffi::types::{
    GrAabb, GrBodyDef, GrBodyId, GrBodyType, GrChainId, GrCircle, GrDistanceJointDef, GrFilter,
    GrJointId, GrManifold, GrPolygon, GrRevoluteJointDef, GrRot, GrSegment, GrShapeDef, GrShapeId,
    GrTransform, GrVec2, GrWorldId,
};
pub use ffi::NativeApi;
pub use handle::{BodyId, ChainId, JointId, ShapeId, WorldId};
pub use joint::Joint;
pub use shape::Shape;
pub use views::{Aabb, Transform};
pub use world::events::{BodyListener, ContactHit, ContactListener, SensorListener};
pub use world::{World, WorldDef};
