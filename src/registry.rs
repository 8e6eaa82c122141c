//! Identity Registry: at most one live wrapper per native handle.
//!
//! Every wrapper the crate hands out for a given handle is the same `Rc`; two
//! lookups of the same handle are pointer-equal until the entry is
//! unregistered. Registry presence says nothing about native liveness — the
//! only authoritative check is the native `*_is_valid` call. A stale entry
//! (wrapper outliving its slot) is possible and harmless; a second wrapper
//! for a live handle is not, which is why double-registration panics.
//!
//! Keys are the packed 64-bit form of the owned handle
//! ([`crate::ffi::types::GrBodyId::to_key`] and friends), injective over
//! (slot, world, generation).

use std::any::Any;
use std::collections::HashMap;
use std::rc::Rc;

use crate::body::Body;
use crate::chain::Chain;
use crate::joint::Joint;
use crate::shape::Shape;

/// One handle-kind's map. Kinds never share a key space.
pub(crate) struct KindMap<T> {
    entries: HashMap<u64, Rc<T>>,
    kind: &'static str,
}

impl<T> KindMap<T> {
    fn new(kind: &'static str) -> Self {
        KindMap {
            entries: HashMap::new(),
            kind,
        }
    }

    /// # Panics
    /// If `key` is already registered. Two wrappers for one live handle is a
    /// programming error, not a recoverable state.
    pub(crate) fn register(&mut self, key: u64, wrapper: Rc<T>) {
        let prev = self.entries.insert(key, wrapper);
        assert!(
            prev.is_none(),
            "{} handle {key:#018x} registered twice",
            self.kind
        );
    }

    pub(crate) fn lookup(&self, key: u64) -> Option<Rc<T>> {
        self.entries.get(&key).cloned()
    }

    /// Removes and returns the entry. Absent keys are a no-op: destruction
    /// paths may race a transient that was never materialized.
    pub(crate) fn unregister(&mut self, key: u64) -> Option<Rc<T>> {
        self.entries.remove(&key)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Per-world wrapper identity, one map per handle kind, plus the per-shape
/// payload side table.
pub(crate) struct IdentityRegistry {
    pub(crate) bodies: KindMap<Body>,
    pub(crate) shapes: KindMap<Shape>,
    pub(crate) joints: KindMap<Joint>,
    pub(crate) chains: KindMap<Chain>,
    /// User payloads for shapes, keyed like the wrapper map. Kept out of the
    /// wrapper so payloads survive paths that never materialize one.
    shape_payloads: HashMap<u64, Box<dyn Any>>,
}

impl IdentityRegistry {
    pub(crate) fn new() -> Self {
        IdentityRegistry {
            bodies: KindMap::new("body"),
            shapes: KindMap::new("shape"),
            joints: KindMap::new("joint"),
            chains: KindMap::new("chain"),
            shape_payloads: HashMap::new(),
        }
    }

    pub(crate) fn set_shape_payload(&mut self, key: u64, payload: Option<Box<dyn Any>>) {
        match payload {
            Some(p) => {
                self.shape_payloads.insert(key, p);
            }
            None => {
                self.shape_payloads.remove(&key);
            }
        }
    }

    pub(crate) fn take_shape_payload(&mut self, key: u64) -> Option<Box<dyn Any>> {
        self.shape_payloads.remove(&key)
    }

    pub(crate) fn with_shape_payload<R>(
        &self,
        key: u64,
        f: impl FnOnce(Option<&dyn Any>) -> R,
    ) -> R {
        f(self.shape_payloads.get(&key).map(|b| b.as_ref()))
    }

    /// Total live entries across every kind. Zero after all managed objects
    /// are destroyed, in any destruction order.
    pub(crate) fn live_entries(&self) -> usize {
        self.bodies.len() + self.shapes.len() + self.joints.len() + self.chains.len()
    }

    /// Drops every entry and payload. World destruction only: outstanding
    /// `Rc`s keep their wrappers alive but those wrappers are stale.
    pub(crate) fn clear(&mut self) {
        self.bodies.entries.clear();
        self.shapes.entries.clear();
        self.joints.entries.clear();
        self.chains.entries.clear();
        self.shape_payloads.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_lookup_unregister_contract() {
        let mut map: KindMap<u32> = KindMap::new("test");
        let value = Rc::new(7u32);
        map.register(42, value.clone());

        let found = map.lookup(42).unwrap();
        assert!(Rc::ptr_eq(&found, &value), "lookup returns the same Rc");
        assert!(map.lookup(43).is_none());

        assert!(map.unregister(42).is_some());
        assert!(map.lookup(42).is_none());
        assert!(map.unregister(42).is_none(), "second unregister is a no-op");
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn double_register_panics() {
        let mut map: KindMap<u32> = KindMap::new("test");
        map.register(1, Rc::new(0));
        map.register(1, Rc::new(0));
    }

    #[test]
    fn shape_payloads_live_in_the_side_table() {
        let mut registry = IdentityRegistry::new();
        registry.set_shape_payload(9, Some(Box::new("tag")));
        registry.with_shape_payload(9, |p| {
            let tag = p.and_then(|a| a.downcast_ref::<&str>());
            assert_eq!(tag, Some(&"tag"));
        });
        assert!(registry.take_shape_payload(9).is_some());
        assert!(registry.take_shape_payload(9).is_none());
        assert_eq!(registry.live_entries(), 0);
    }
}
