//! Embedded reference backend.
//!
//! Implements every entry point of the documented ABI in Rust so the bridge
//! can run headless (CI, deterministic fallback) without the closed native
//! binary. The contract surface is faithful — generational slot recycling,
//! definition-cookie validation, per-step event buffers, capacity-clamped
//! bulk queries, upcall dispatch — while the dynamics are deliberately
//! minimal: semi-implicit Euler integration and translated-AABB touch
//! detection. This backend validates the bridge, not the physics.
//!
//! State is process-global behind one mutex, exactly as an opaque native
//! library would be. Upcalls (filter, pre-solve, tasks) are invoked while the
//! table is locked; they must not call back into the ABI, which is already
//! the documented contract for them.

use std::collections::HashMap;
use std::os::raw::c_void;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use super::types::*;

// --- Generational slot pool ---

struct Slot<T> {
    generation: u16,
    value: Option<T>,
}

struct Pool<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
}

impl<T> Pool<T> {
    fn new() -> Self {
        Pool {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Returns the 1-based slot index and the generation issued.
    fn alloc(&mut self, value: T) -> (i32, u16) {
        match self.free.pop() {
            Some(slot_index) => {
                let slot = &mut self.slots[slot_index];
                slot.value = Some(value);
                (slot_index as i32 + 1, slot.generation)
            }
            None => {
                self.slots.push(Slot {
                    generation: 1,
                    value: Some(value),
                });
                (self.slots.len() as i32, 1)
            }
        }
    }

    fn get(&self, index1: i32, generation: u16) -> Option<&T> {
        let slot = self.slots.get(usize::try_from(index1).ok()?.checked_sub(1)?)?;
        if slot.generation != generation {
            return None;
        }
        slot.value.as_ref()
    }

    fn get_mut(&mut self, index1: i32, generation: u16) -> Option<&mut T> {
        let slot = self
            .slots
            .get_mut(usize::try_from(index1).ok()?.checked_sub(1)?)?;
        if slot.generation != generation {
            return None;
        }
        slot.value.as_mut()
    }

    fn get_by_index(&self, index1: i32) -> Option<(&T, u16)> {
        let slot = self.slots.get(usize::try_from(index1).ok()?.checked_sub(1)?)?;
        slot.value.as_ref().map(|v| (v, slot.generation))
    }

    fn get_by_index_mut(&mut self, index1: i32) -> Option<&mut T> {
        let slot = self
            .slots
            .get_mut(usize::try_from(index1).ok()?.checked_sub(1)?)?;
        slot.value.as_mut()
    }

    /// Frees the slot and advances its generation, staling outstanding ids.
    fn free(&mut self, index1: i32, generation: u16) -> Option<T> {
        self.get(index1, generation)?;
        self.free_by_index(index1)
    }

    fn free_by_index(&mut self, index1: i32) -> Option<T> {
        let slot_index = usize::try_from(index1).ok()?.checked_sub(1)?;
        let slot = self.slots.get_mut(slot_index)?;
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1).max(1);
        self.free.push(slot_index);
        Some(value)
    }

    fn generation_of(&self, index1: i32) -> Option<u16> {
        let slot = self.slots.get(usize::try_from(index1).ok()?.checked_sub(1)?)?;
        slot.value.as_ref().map(|_| slot.generation)
    }

    fn live_indices(&self) -> Vec<i32> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.value.is_some())
            .map(|(i, _)| i as i32 + 1)
            .collect()
    }
}

// --- Backend object model ---

#[derive(Copy, Clone)]
struct SendPtr(*mut c_void);
// Context pointers stored in the global table; the embedder promises the
// pointed-to callback state is usable from worker threads.
unsafe impl Send for SendPtr {}

#[derive(Copy, Clone)]
enum Geometry {
    Circle(GrCircle),
    Polygon(GrPolygon),
    Segment(GrSegment),
}

impl Geometry {
    fn local_aabb(&self) -> GrAabb {
        match self {
            Geometry::Circle(c) => GrAabb {
                lower: GrVec2::new(c.center.x - c.radius, c.center.y - c.radius),
                upper: GrVec2::new(c.center.x + c.radius, c.center.y + c.radius),
            },
            Geometry::Polygon(p) => {
                let mut lower = GrVec2::new(f32::MAX, f32::MAX);
                let mut upper = GrVec2::new(f32::MIN, f32::MIN);
                for v in &p.vertices[..p.count.max(0) as usize] {
                    lower.x = lower.x.min(v.x);
                    lower.y = lower.y.min(v.y);
                    upper.x = upper.x.max(v.x);
                    upper.y = upper.y.max(v.y);
                }
                GrAabb { lower, upper }
            }
            Geometry::Segment(s) => GrAabb {
                lower: GrVec2::new(s.point1.x.min(s.point2.x), s.point1.y.min(s.point2.y)),
                upper: GrVec2::new(s.point1.x.max(s.point2.x), s.point1.y.max(s.point2.y)),
            },
        }
    }

    fn area(&self) -> f32 {
        match self {
            Geometry::Circle(c) => std::f32::consts::PI * c.radius * c.radius,
            Geometry::Polygon(p) => {
                // Shoelace over the first `count` vertices.
                let n = p.count.max(0) as usize;
                let mut twice = 0.0f32;
                for i in 0..n {
                    let a = p.vertices[i];
                    let b = p.vertices[(i + 1) % n];
                    twice += a.x * b.y - b.x * a.y;
                }
                (twice * 0.5).abs()
            }
            Geometry::Segment(_) => 0.0,
        }
    }
}

struct StubShape {
    body_index: i32,
    filter: GrFilter,
    density: f32,
    is_sensor: bool,
    enable_sensor_events: bool,
    enable_contact_events: bool,
    enable_hit_events: bool,
    enable_pre_solve_events: bool,
    geometry: Geometry,
}

struct StubBody {
    body_type: i32,
    transform: GrTransform,
    linear_velocity: GrVec2,
    angular_velocity: f32,
    linear_damping: f32,
    angular_damping: f32,
    gravity_scale: f32,
    awake: bool,
    enabled: bool,
    fixed_rotation: bool,
    force: GrVec2,
    shapes: Vec<i32>,
    joints: Vec<i32>,
    chains: Vec<i32>,
}

struct StubJoint {
    body_a: GrBodyId,
    body_b: GrBodyId,
}

struct StubChain {
    segments: Vec<i32>,
}

struct StubWorld {
    gravity: GrVec2,
    hit_speed_threshold: f32,
    custom_filter: Option<(GrCustomFilterFn, SendPtr)>,
    pre_solve: Option<(GrPreSolveFn, SendPtr)>,
    enqueue_task: Option<GrEnqueueTaskFn>,
    finish_task: Option<GrFinishTaskFn>,
    task_context: SendPtr,
    bodies: Pool<StubBody>,
    shapes: Pool<StubShape>,
    joints: Pool<StubJoint>,
    chains: Pool<StubChain>,
    contact_begin: Vec<GrContactBeginTouchEvent>,
    contact_end: Vec<GrContactEndTouchEvent>,
    contact_hit: Vec<GrContactHitEvent>,
    sensor_begin: Vec<GrSensorBeginTouchEvent>,
    sensor_end: Vec<GrSensorEndTouchEvent>,
    body_moves: Vec<GrBodyMoveEvent>,
    touching: HashMap<(u64, u64), (GrShapeId, GrShapeId)>,
    sensor_touching: HashMap<(u64, u64), (GrShapeId, GrShapeId)>,
}

fn table() -> MutexGuard<'static, Pool<StubWorld>> {
    static TABLE: OnceLock<Mutex<Pool<StubWorld>>> = OnceLock::new();
    TABLE
        .get_or_init(|| Mutex::new(Pool::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

fn world_mut<'a>(pool: &'a mut Pool<StubWorld>, id: GrWorldId) -> Option<&'a mut StubWorld> {
    pool.get_mut(id.index as i32, id.generation)
}

/// Owned ids carry only the world's slot index; the world's current tenant is
/// authoritative.
fn owner_mut<'a>(pool: &'a mut Pool<StubWorld>, world_index: u16) -> Option<&'a mut StubWorld> {
    pool.get_by_index_mut(world_index as i32)
}

fn compose_body_id(world_index: u16, index: i32, generation: u16) -> GrBodyId {
    GrBodyId {
        index,
        world: world_index,
        generation,
    }
}

fn compose_shape_id(world_index: u16, index: i32, generation: u16) -> GrShapeId {
    GrShapeId {
        index,
        world: world_index,
        generation,
    }
}

// --- World ---

pub(super) unsafe extern "C" fn world_create(def: *const GrWorldDef) -> GrWorldId {
    if def.is_null() {
        return GrWorldId::NULL;
    }
    let def = unsafe { &*def };
    if def.magic != GR_DEF_MAGIC {
        return GrWorldId::NULL;
    }
    let world = StubWorld {
        gravity: def.gravity,
        hit_speed_threshold: def.restitution_threshold.max(0.05),
        custom_filter: None,
        pre_solve: None,
        enqueue_task: def.enqueue_task,
        finish_task: def.finish_task,
        task_context: SendPtr(def.user_task_context),
        bodies: Pool::new(),
        shapes: Pool::new(),
        joints: Pool::new(),
        chains: Pool::new(),
        contact_begin: Vec::new(),
        contact_end: Vec::new(),
        contact_hit: Vec::new(),
        sensor_begin: Vec::new(),
        sensor_end: Vec::new(),
        body_moves: Vec::new(),
        touching: HashMap::new(),
        sensor_touching: HashMap::new(),
    };
    let mut pool = table();
    let (index, generation) = pool.alloc(world);
    GrWorldId {
        index: index as u16,
        generation,
    }
}

pub(super) unsafe extern "C" fn world_destroy(id: GrWorldId) {
    let mut pool = table();
    pool.free(id.index as i32, id.generation);
}

pub(super) unsafe extern "C" fn world_is_valid(id: GrWorldId) -> bool {
    if id.is_null() {
        return false;
    }
    table().get(id.index as i32, id.generation).is_some()
}

pub(super) unsafe extern "C" fn world_set_gravity(id: GrWorldId, gravity: GrVec2) {
    let mut pool = table();
    if let Some(world) = world_mut(&mut pool, id) {
        world.gravity = gravity;
    }
}

pub(super) unsafe extern "C" fn world_get_gravity(id: GrWorldId) -> GrVec2 {
    let mut pool = table();
    world_mut(&mut pool, id).map_or(GrVec2::ZERO, |w| w.gravity)
}

pub(super) unsafe extern "C" fn world_set_custom_filter(
    id: GrWorldId,
    callback: Option<GrCustomFilterFn>,
    context: *mut c_void,
) {
    let mut pool = table();
    if let Some(world) = world_mut(&mut pool, id) {
        world.custom_filter = callback.map(|f| (f, SendPtr(context)));
    }
}

pub(super) unsafe extern "C" fn world_set_pre_solve(
    id: GrWorldId,
    callback: Option<GrPreSolveFn>,
    context: *mut c_void,
) {
    let mut pool = table();
    if let Some(world) = world_mut(&mut pool, id) {
        world.pre_solve = callback.map(|f| (f, SendPtr(context)));
    }
}

pub(super) unsafe extern "C" fn world_contact_events(id: GrWorldId) -> GrContactEvents {
    let mut pool = table();
    match world_mut(&mut pool, id) {
        Some(w) => GrContactEvents {
            begin_events: w.contact_begin.as_ptr(),
            end_events: w.contact_end.as_ptr(),
            hit_events: w.contact_hit.as_ptr(),
            begin_count: w.contact_begin.len() as i32,
            end_count: w.contact_end.len() as i32,
            hit_count: w.contact_hit.len() as i32,
            _pad0: 0,
        },
        None => GrContactEvents {
            begin_events: std::ptr::null(),
            end_events: std::ptr::null(),
            hit_events: std::ptr::null(),
            begin_count: 0,
            end_count: 0,
            hit_count: 0,
            _pad0: 0,
        },
    }
}

pub(super) unsafe extern "C" fn world_sensor_events(id: GrWorldId) -> GrSensorEvents {
    let mut pool = table();
    match world_mut(&mut pool, id) {
        Some(w) => GrSensorEvents {
            begin_events: w.sensor_begin.as_ptr(),
            end_events: w.sensor_end.as_ptr(),
            begin_count: w.sensor_begin.len() as i32,
            end_count: w.sensor_end.len() as i32,
        },
        None => GrSensorEvents {
            begin_events: std::ptr::null(),
            end_events: std::ptr::null(),
            begin_count: 0,
            end_count: 0,
        },
    }
}

pub(super) unsafe extern "C" fn world_body_events(id: GrWorldId) -> GrBodyEvents {
    let mut pool = table();
    match world_mut(&mut pool, id) {
        Some(w) => GrBodyEvents {
            move_events: w.body_moves.as_ptr(),
            move_count: w.body_moves.len() as i32,
            _pad0: 0,
        },
        None => GrBodyEvents {
            move_events: std::ptr::null(),
            move_count: 0,
            _pad0: 0,
        },
    }
}

/// Inputs/outputs for the parallel AABB refresh dispatched through the
/// embedder's task system when one is registered.
struct AabbEntry {
    local: GrAabb,
    translation: GrVec2,
    world_aabb: GrAabb,
}

struct AabbTask {
    entries: *mut AabbEntry,
}

unsafe extern "C" fn refresh_aabbs_task(
    start: i32,
    end: i32,
    _worker_index: u32,
    task_context: *mut c_void,
) {
    let task = unsafe { &*(task_context as *const AabbTask) };
    for i in start..end {
        // Ranges partition [0, n); no two workers touch the same entry.
        let entry = unsafe { &mut *task.entries.add(i as usize) };
        entry.world_aabb = GrAabb {
            lower: GrVec2::new(
                entry.local.lower.x + entry.translation.x,
                entry.local.lower.y + entry.translation.y,
            ),
            upper: GrVec2::new(
                entry.local.upper.x + entry.translation.x,
                entry.local.upper.y + entry.translation.y,
            ),
        };
    }
}

pub(super) unsafe extern "C" fn world_step(id: GrWorldId, time_step: f32, sub_step_count: i32) {
    let mut pool = table();
    let world_index = id.index;
    let Some(world) = world_mut(&mut pool, id) else {
        return;
    };

    // Buffers from the previous step die here, not before: they stay valid
    // right up to this call, as the ABI documents.
    world.contact_begin.clear();
    world.contact_end.clear();
    world.contact_hit.clear();
    world.sensor_begin.clear();
    world.sensor_end.clear();
    world.body_moves.clear();

    let substeps = sub_step_count.max(1);
    let h = time_step / substeps as f32;

    // Integrate.
    let body_indices = world.bodies.live_indices();
    let mut before = Vec::with_capacity(body_indices.len());
    for &bi in &body_indices {
        if let Some((body, _)) = world.bodies.get_by_index(bi) {
            before.push((bi, body.transform));
        }
    }
    for &bi in &body_indices {
        let gravity = world.gravity;
        let Some(body) = world.bodies.get_by_index_mut(bi) else {
            continue;
        };
        if body.body_type != GrBodyType::Dynamic as i32 || !body.enabled || !body.awake {
            body.force = GrVec2::ZERO;
            continue;
        }
        for _ in 0..substeps {
            body.linear_velocity.x += h * (gravity.x * body.gravity_scale + body.force.x);
            body.linear_velocity.y += h * (gravity.y * body.gravity_scale + body.force.y);
            let lin_decay = 1.0 / (1.0 + h * body.linear_damping);
            body.linear_velocity.x *= lin_decay;
            body.linear_velocity.y *= lin_decay;
            body.transform.p.x += body.linear_velocity.x * h;
            body.transform.p.y += body.linear_velocity.y * h;
            if !body.fixed_rotation {
                body.angular_velocity *= 1.0 / (1.0 + h * body.angular_damping);
                let angle = body.transform.q.angle() + body.angular_velocity * h;
                body.transform.q = GrRot::from_angle(angle);
            }
        }
        body.force = GrVec2::ZERO;
    }

    // Move events for bodies whose transform changed.
    for (bi, old) in before {
        let Some(generation) = world.bodies.generation_of(bi) else {
            continue;
        };
        let Some((body, _)) = world.bodies.get_by_index(bi) else {
            continue;
        };
        if body.transform != old {
            world.body_moves.push(GrBodyMoveEvent {
                transform: body.transform,
                body: compose_body_id(world_index, bi, generation),
                fell_asleep: 0,
                _pad0: [0; 3],
            });
        }
    }

    // Snapshot live shapes and refresh world AABBs, through the embedder's
    // task system when one is registered.
    struct PairShape {
        id: GrShapeId,
        body_index: i32,
        body_type: i32,
        velocity: GrVec2,
        filter: GrFilter,
        is_sensor: bool,
        enable_sensor_events: bool,
        enable_contact_events: bool,
        enable_hit_events: bool,
        enable_pre_solve_events: bool,
    }

    let mut pair_shapes = Vec::new();
    let mut entries = Vec::new();
    for si in world.shapes.live_indices() {
        let Some(generation) = world.shapes.generation_of(si) else {
            continue;
        };
        let Some((shape, _)) = world.shapes.get_by_index(si) else {
            continue;
        };
        let Some((body, _)) = world.bodies.get_by_index(shape.body_index) else {
            continue;
        };
        if !body.enabled {
            continue;
        }
        pair_shapes.push(PairShape {
            id: compose_shape_id(world_index, si, generation),
            body_index: shape.body_index,
            body_type: body.body_type,
            velocity: body.linear_velocity,
            filter: shape.filter,
            is_sensor: shape.is_sensor,
            enable_sensor_events: shape.enable_sensor_events,
            enable_contact_events: shape.enable_contact_events,
            enable_hit_events: shape.enable_hit_events,
            enable_pre_solve_events: shape.enable_pre_solve_events,
        });
        entries.push(AabbEntry {
            local: shape.geometry.local_aabb(),
            translation: body.transform.p,
            world_aabb: GrAabb {
                lower: GrVec2::ZERO,
                upper: GrVec2::ZERO,
            },
        });
    }

    let count = entries.len() as i32;
    if count > 0 {
        let task = AabbTask {
            entries: entries.as_mut_ptr(),
        };
        let ctx = &task as *const AabbTask as *mut c_void;
        match (world.enqueue_task, world.finish_task) {
            (Some(enqueue), Some(finish)) => {
                let handle =
                    unsafe { enqueue(refresh_aabbs_task, count, 16, ctx, world.task_context.0) };
                unsafe { finish(handle, world.task_context.0) };
            }
            _ => unsafe { refresh_aabbs_task(0, count, 0, ctx) },
        }
    }

    // Touch bookkeeping. O(n^2) is fine for a reference backend.
    let mut contact_now: HashMap<(u64, u64), (GrShapeId, GrShapeId)> = HashMap::new();
    let mut sensor_now: HashMap<(u64, u64), (GrShapeId, GrShapeId)> = HashMap::new();

    for i in 0..pair_shapes.len() {
        for j in (i + 1)..pair_shapes.len() {
            let (a, b) = (&pair_shapes[i], &pair_shapes[j]);
            if a.body_index == b.body_index {
                continue;
            }
            if a.is_sensor && b.is_sensor {
                continue;
            }
            if !entries[i].world_aabb.overlaps(&entries[j].world_aabb) {
                continue;
            }
            if !a.filter.should_collide(&b.filter) {
                continue;
            }

            if a.is_sensor || b.is_sensor {
                let (sensor, visitor) = if a.is_sensor { (a, b) } else { (b, a) };
                if !sensor.enable_sensor_events {
                    continue;
                }
                let key = pair_key(sensor.id, visitor.id);
                sensor_now.insert(key, (sensor.id, visitor.id));
                continue;
            }

            // Dynamic vs dynamic/static contact.
            let both_static = a.body_type != GrBodyType::Dynamic as i32
                && b.body_type != GrBodyType::Dynamic as i32;
            if both_static || !a.enable_contact_events || !b.enable_contact_events {
                continue;
            }
            if let Some((filter_fn, ctx)) = world.custom_filter {
                if !unsafe { filter_fn(a.id, b.id, ctx.0) } {
                    continue;
                }
            }

            let key = pair_key(a.id, b.id);
            let is_new = !world.touching.contains_key(&key);
            if is_new && (a.enable_pre_solve_events || b.enable_pre_solve_events) {
                if let Some((pre_solve_fn, ctx)) = world.pre_solve {
                    let manifold = contact_manifold(&entries[i], &entries[j]);
                    if !unsafe { pre_solve_fn(a.id, b.id, &manifold, ctx.0) } {
                        continue;
                    }
                }
            }
            contact_now.insert(key, (a.id, b.id));

            if is_new && a.enable_hit_events && b.enable_hit_events {
                let rel = GrVec2::new(
                    a.velocity.x - b.velocity.x,
                    a.velocity.y - b.velocity.y,
                );
                let speed = (rel.x * rel.x + rel.y * rel.y).sqrt();
                if speed > world.hit_speed_threshold {
                    let manifold = contact_manifold(&entries[i], &entries[j]);
                    world.contact_hit.push(GrContactHitEvent {
                        shape_a: a.id,
                        shape_b: b.id,
                        point: manifold.points[0].point,
                        normal: manifold.normal,
                        approach_speed: speed,
                    });
                }
            }
        }
    }

    // Begin events: in current but not previous.
    for (key, &(sa, sb)) in &contact_now {
        if !world.touching.contains_key(key) {
            world
                .contact_begin
                .push(GrContactBeginTouchEvent { shape_a: sa, shape_b: sb });
        }
    }
    // End events: in previous but not current (including destroyed shapes).
    for (key, &(sa, sb)) in &world.touching {
        if !contact_now.contains_key(key) {
            world
                .contact_end
                .push(GrContactEndTouchEvent { shape_a: sa, shape_b: sb });
        }
    }
    world.touching = contact_now;

    for (key, &(sensor, visitor)) in &sensor_now {
        if !world.sensor_touching.contains_key(key) {
            world.sensor_begin.push(GrSensorBeginTouchEvent {
                sensor_shape: sensor,
                visitor_shape: visitor,
            });
        }
    }
    for (key, &(sensor, visitor)) in &world.sensor_touching {
        if !sensor_now.contains_key(key) {
            world.sensor_end.push(GrSensorEndTouchEvent {
                sensor_shape: sensor,
                visitor_shape: visitor,
            });
        }
    }
    world.sensor_touching = sensor_now;
}

fn pair_key(a: GrShapeId, b: GrShapeId) -> (u64, u64) {
    let (ka, kb) = (a.to_key(), b.to_key());
    if ka <= kb {
        (ka, kb)
    } else {
        (kb, ka)
    }
}

fn contact_manifold(a: &AabbEntry, b: &AabbEntry) -> GrManifold {
    let center = |aabb: &GrAabb| {
        GrVec2::new(
            (aabb.lower.x + aabb.upper.x) * 0.5,
            (aabb.lower.y + aabb.upper.y) * 0.5,
        )
    };
    let ca = center(&a.world_aabb);
    let cb = center(&b.world_aabb);
    let mut normal = GrVec2::new(cb.x - ca.x, cb.y - ca.y);
    let len = (normal.x * normal.x + normal.y * normal.y).sqrt();
    if len > 1.0e-9 {
        normal.x /= len;
        normal.y /= len;
    } else {
        normal = GrVec2::new(0.0, 1.0);
    }
    let mut manifold = GrManifold {
        points: [GrManifoldPoint {
            point: GrVec2::new((ca.x + cb.x) * 0.5, (ca.y + cb.y) * 0.5),
            separation: 0.0,
            normal_impulse: 0.0,
        }; 2],
        normal,
        point_count: 1,
        _pad0: 0,
    };
    manifold.points[1] = GrManifoldPoint {
        point: GrVec2::ZERO,
        separation: 0.0,
        normal_impulse: 0.0,
    };
    manifold
}

// --- Body ---

pub(super) unsafe extern "C" fn body_create(world_id: GrWorldId, def: *const GrBodyDef) -> GrBodyId {
    if def.is_null() {
        return GrBodyId::NULL;
    }
    let def = unsafe { &*def };
    if def.magic != GR_DEF_MAGIC {
        return GrBodyId::NULL;
    }
    let mut pool = table();
    let Some(world) = world_mut(&mut pool, world_id) else {
        return GrBodyId::NULL;
    };
    let body = StubBody {
        body_type: def.body_type as i32,
        transform: GrTransform {
            p: def.position,
            q: def.rotation,
        },
        linear_velocity: def.linear_velocity,
        angular_velocity: def.angular_velocity,
        linear_damping: def.linear_damping,
        angular_damping: def.angular_damping,
        gravity_scale: def.gravity_scale,
        awake: def.is_awake != 0,
        enabled: def.is_enabled != 0,
        fixed_rotation: def.fixed_rotation != 0,
        force: GrVec2::ZERO,
        shapes: Vec::new(),
        joints: Vec::new(),
        chains: Vec::new(),
    };
    let (index, generation) = world.bodies.alloc(body);
    compose_body_id(world_id.index, index, generation)
}

fn body_ref<'a>(pool: &'a mut Pool<StubWorld>, id: GrBodyId) -> Option<&'a StubBody> {
    let world = owner_mut(pool, id.world)?;
    world.bodies.get(id.index, id.generation)
}

fn body_ref_mut<'a>(pool: &'a mut Pool<StubWorld>, id: GrBodyId) -> Option<&'a mut StubBody> {
    let world = owner_mut(pool, id.world)?;
    world.bodies.get_mut(id.index, id.generation)
}

pub(super) unsafe extern "C" fn body_destroy(id: GrBodyId) {
    let mut pool = table();
    let Some(world) = owner_mut(&mut pool, id.world) else {
        return;
    };
    let Some(body) = world.bodies.free(id.index, id.generation) else {
        return;
    };
    for si in body.shapes {
        world.shapes.free_by_index(si);
    }
    for ci in body.chains {
        if let Some(chain) = world.chains.free_by_index(ci) {
            for si in chain.segments {
                world.shapes.free_by_index(si);
            }
        }
    }
    for ji in body.joints {
        if let Some(joint) = world.joints.free_by_index(ji) {
            // Detach from the opposite body's joint list.
            for other in [joint.body_a, joint.body_b] {
                if other.index == id.index && other.world == id.world {
                    continue;
                }
                if let Some(other_body) = world.bodies.get_mut(other.index, other.generation) {
                    other_body.joints.retain(|&j| j != ji);
                }
            }
        }
    }
}

pub(super) unsafe extern "C" fn body_is_valid(id: GrBodyId) -> bool {
    if id.is_null() {
        return false;
    }
    let mut pool = table();
    body_ref(&mut pool, id).is_some()
}

pub(super) unsafe extern "C" fn body_get_position(id: GrBodyId) -> GrVec2 {
    let mut pool = table();
    body_ref(&mut pool, id).map_or(GrVec2::ZERO, |b| b.transform.p)
}

pub(super) unsafe extern "C" fn body_get_rotation(id: GrBodyId) -> GrRot {
    let mut pool = table();
    body_ref(&mut pool, id).map_or(GrRot::IDENTITY, |b| b.transform.q)
}

pub(super) unsafe extern "C" fn body_get_transform(id: GrBodyId) -> GrTransform {
    let mut pool = table();
    body_ref(&mut pool, id).map_or(GrTransform::IDENTITY, |b| b.transform)
}

pub(super) unsafe extern "C" fn body_set_transform(id: GrBodyId, position: GrVec2, rotation: GrRot) {
    let mut pool = table();
    if let Some(body) = body_ref_mut(&mut pool, id) {
        body.transform = GrTransform {
            p: position,
            q: rotation,
        };
    }
}

pub(super) unsafe extern "C" fn body_get_linear_velocity(id: GrBodyId) -> GrVec2 {
    let mut pool = table();
    body_ref(&mut pool, id).map_or(GrVec2::ZERO, |b| b.linear_velocity)
}

pub(super) unsafe extern "C" fn body_set_linear_velocity(id: GrBodyId, velocity: GrVec2) {
    let mut pool = table();
    if let Some(body) = body_ref_mut(&mut pool, id) {
        body.linear_velocity = velocity;
    }
}

pub(super) unsafe extern "C" fn body_get_angular_velocity(id: GrBodyId) -> f32 {
    let mut pool = table();
    body_ref(&mut pool, id).map_or(0.0, |b| b.angular_velocity)
}

pub(super) unsafe extern "C" fn body_set_angular_velocity(id: GrBodyId, velocity: f32) {
    let mut pool = table();
    if let Some(body) = body_ref_mut(&mut pool, id) {
        body.angular_velocity = velocity;
    }
}

pub(super) unsafe extern "C" fn body_apply_force_center(id: GrBodyId, force: GrVec2, wake: bool) {
    let mut pool = table();
    if let Some(body) = body_ref_mut(&mut pool, id) {
        body.force.x += force.x;
        body.force.y += force.y;
        if wake {
            body.awake = true;
        }
    }
}

pub(super) unsafe extern "C" fn body_apply_impulse_center(id: GrBodyId, impulse: GrVec2, wake: bool) {
    let mut pool = table();
    let Some(world) = owner_mut(&mut pool, id.world) else {
        return;
    };
    let mass = body_mass(world, id).max(1.0e-6);
    if let Some(body) = world.bodies.get_mut(id.index, id.generation) {
        body.linear_velocity.x += impulse.x / mass;
        body.linear_velocity.y += impulse.y / mass;
        if wake {
            body.awake = true;
        }
    }
}

fn body_mass(world: &StubWorld, id: GrBodyId) -> f32 {
    let Some(body) = world.bodies.get(id.index, id.generation) else {
        return 0.0;
    };
    if body.body_type != GrBodyType::Dynamic as i32 {
        return 0.0;
    }
    body.shapes
        .iter()
        .filter_map(|&si| world.shapes.get_by_index(si))
        .map(|(s, _)| s.density * s.geometry.area())
        .sum()
}

pub(super) unsafe extern "C" fn body_get_type(id: GrBodyId) -> i32 {
    let mut pool = table();
    body_ref(&mut pool, id).map_or(GrBodyType::Static as i32, |b| b.body_type)
}

pub(super) unsafe extern "C" fn body_set_type(id: GrBodyId, body_type: i32) {
    let mut pool = table();
    if let Some(body) = body_ref_mut(&mut pool, id) {
        body.body_type = body_type;
    }
}

pub(super) unsafe extern "C" fn body_get_mass(id: GrBodyId) -> f32 {
    let mut pool = table();
    let Some(world) = owner_mut(&mut pool, id.world) else {
        return 0.0;
    };
    body_mass(world, id)
}

pub(super) unsafe extern "C" fn body_is_awake(id: GrBodyId) -> bool {
    let mut pool = table();
    body_ref(&mut pool, id).is_some_and(|b| b.awake)
}

pub(super) unsafe extern "C" fn body_set_awake(id: GrBodyId, awake: bool) {
    let mut pool = table();
    if let Some(body) = body_ref_mut(&mut pool, id) {
        body.awake = awake;
    }
}

pub(super) unsafe extern "C" fn body_shape_count(id: GrBodyId) -> i32 {
    let mut pool = table();
    body_ref(&mut pool, id).map_or(0, |b| b.shapes.len() as i32)
}

pub(super) unsafe extern "C" fn body_get_shapes(
    id: GrBodyId,
    out: *mut GrShapeId,
    capacity: i32,
) -> i32 {
    let mut pool = table();
    let Some(world) = owner_mut(&mut pool, id.world) else {
        return 0;
    };
    let Some(body) = world.bodies.get(id.index, id.generation) else {
        return 0;
    };
    if out.is_null() || capacity <= 0 {
        return 0;
    }
    let mut written = 0usize;
    for &si in body.shapes.iter().take(capacity as usize) {
        let Some(generation) = world.shapes.generation_of(si) else {
            continue;
        };
        unsafe {
            out.add(written)
                .write(compose_shape_id(id.world, si, generation));
        }
        written += 1;
    }
    written as i32
}

pub(super) unsafe extern "C" fn body_joint_count(id: GrBodyId) -> i32 {
    let mut pool = table();
    body_ref(&mut pool, id).map_or(0, |b| b.joints.len() as i32)
}

pub(super) unsafe extern "C" fn body_get_joints(
    id: GrBodyId,
    out: *mut GrJointId,
    capacity: i32,
) -> i32 {
    let mut pool = table();
    let Some(world) = owner_mut(&mut pool, id.world) else {
        return 0;
    };
    let Some(body) = world.bodies.get(id.index, id.generation) else {
        return 0;
    };
    if out.is_null() || capacity <= 0 {
        return 0;
    }
    let mut written = 0usize;
    for &ji in body.joints.iter().take(capacity as usize) {
        let Some(generation) = world.joints.generation_of(ji) else {
            continue;
        };
        unsafe {
            out.add(written).write(GrJointId {
                index: ji,
                world: id.world,
                generation,
            });
        }
        written += 1;
    }
    written as i32
}

// --- Shape ---

fn shape_create(body_id: GrBodyId, def: *const GrShapeDef, geometry: Geometry) -> GrShapeId {
    if def.is_null() {
        return GrShapeId::NULL;
    }
    let def = unsafe { &*def };
    if def.magic != GR_DEF_MAGIC {
        return GrShapeId::NULL;
    }
    let mut pool = table();
    let Some(world) = owner_mut(&mut pool, body_id.world) else {
        return GrShapeId::NULL;
    };
    if world.bodies.get(body_id.index, body_id.generation).is_none() {
        return GrShapeId::NULL;
    }
    let shape = StubShape {
        body_index: body_id.index,
        filter: def.filter,
        density: def.density,
        is_sensor: def.is_sensor != 0,
        enable_sensor_events: def.enable_sensor_events != 0,
        enable_contact_events: def.enable_contact_events != 0,
        enable_hit_events: def.enable_hit_events != 0,
        enable_pre_solve_events: def.enable_pre_solve_events != 0,
        geometry,
    };
    let (index, generation) = world.shapes.alloc(shape);
    if let Some(body) = world.bodies.get_mut(body_id.index, body_id.generation) {
        body.shapes.push(index);
    }
    compose_shape_id(body_id.world, index, generation)
}

pub(super) unsafe extern "C" fn shape_create_circle(
    body: GrBodyId,
    def: *const GrShapeDef,
    circle: *const GrCircle,
) -> GrShapeId {
    if circle.is_null() {
        return GrShapeId::NULL;
    }
    shape_create(body, def, Geometry::Circle(unsafe { *circle }))
}

pub(super) unsafe extern "C" fn shape_create_polygon(
    body: GrBodyId,
    def: *const GrShapeDef,
    polygon: *const GrPolygon,
) -> GrShapeId {
    if polygon.is_null() {
        return GrShapeId::NULL;
    }
    let polygon = unsafe { &*polygon };
    if polygon.count < 3 || polygon.count > GR_MAX_POLYGON_VERTS as i32 {
        return GrShapeId::NULL;
    }
    shape_create(body, def, Geometry::Polygon(*polygon))
}

pub(super) unsafe extern "C" fn shape_create_segment(
    body: GrBodyId,
    def: *const GrShapeDef,
    segment: *const GrSegment,
) -> GrShapeId {
    if segment.is_null() {
        return GrShapeId::NULL;
    }
    shape_create(body, def, Geometry::Segment(unsafe { *segment }))
}

fn shape_ref<'a>(pool: &'a mut Pool<StubWorld>, id: GrShapeId) -> Option<&'a StubShape> {
    let world = owner_mut(pool, id.world)?;
    world.shapes.get(id.index, id.generation)
}

pub(super) unsafe extern "C" fn shape_destroy(id: GrShapeId) {
    let mut pool = table();
    let Some(world) = owner_mut(&mut pool, id.world) else {
        return;
    };
    let Some(shape) = world.shapes.free(id.index, id.generation) else {
        return;
    };
    if let Some(body) = world.bodies.get_by_index_mut(shape.body_index) {
        body.shapes.retain(|&s| s != id.index);
    }
}

pub(super) unsafe extern "C" fn shape_is_valid(id: GrShapeId) -> bool {
    if id.is_null() {
        return false;
    }
    let mut pool = table();
    shape_ref(&mut pool, id).is_some()
}

pub(super) unsafe extern "C" fn shape_get_body(id: GrShapeId) -> GrBodyId {
    let mut pool = table();
    let Some(world) = owner_mut(&mut pool, id.world) else {
        return GrBodyId::NULL;
    };
    let Some(shape) = world.shapes.get(id.index, id.generation) else {
        return GrBodyId::NULL;
    };
    match world.bodies.generation_of(shape.body_index) {
        Some(generation) => compose_body_id(id.world, shape.body_index, generation),
        None => GrBodyId::NULL,
    }
}

pub(super) unsafe extern "C" fn shape_is_sensor(id: GrShapeId) -> bool {
    let mut pool = table();
    shape_ref(&mut pool, id).is_some_and(|s| s.is_sensor)
}

pub(super) unsafe extern "C" fn shape_get_filter(id: GrShapeId) -> GrFilter {
    let mut pool = table();
    shape_ref(&mut pool, id).map_or(GrFilter::default(), |s| s.filter)
}

pub(super) unsafe extern "C" fn shape_set_filter(id: GrShapeId, filter: GrFilter) {
    let mut pool = table();
    let Some(world) = owner_mut(&mut pool, id.world) else {
        return;
    };
    if let Some(shape) = world.shapes.get_mut(id.index, id.generation) {
        shape.filter = filter;
    }
}

pub(super) unsafe extern "C" fn shape_get_aabb(id: GrShapeId) -> GrAabb {
    let mut pool = table();
    let Some(world) = owner_mut(&mut pool, id.world) else {
        return GrAabb {
            lower: GrVec2::ZERO,
            upper: GrVec2::ZERO,
        };
    };
    let Some(shape) = world.shapes.get(id.index, id.generation) else {
        return GrAabb {
            lower: GrVec2::ZERO,
            upper: GrVec2::ZERO,
        };
    };
    let local = shape.geometry.local_aabb();
    let translation = world
        .bodies
        .get_by_index(shape.body_index)
        .map_or(GrVec2::ZERO, |(b, _)| b.transform.p);
    GrAabb {
        lower: GrVec2::new(local.lower.x + translation.x, local.lower.y + translation.y),
        upper: GrVec2::new(local.upper.x + translation.x, local.upper.y + translation.y),
    }
}

pub(super) unsafe extern "C" fn shape_test_point(id: GrShapeId, point: GrVec2) -> bool {
    let mut pool = table();
    let Some(world) = owner_mut(&mut pool, id.world) else {
        return false;
    };
    let Some(shape) = world.shapes.get(id.index, id.generation) else {
        return false;
    };
    let translation = world
        .bodies
        .get_by_index(shape.body_index)
        .map_or(GrVec2::ZERO, |(b, _)| b.transform.p);
    let local = GrVec2::new(point.x - translation.x, point.y - translation.y);
    match &shape.geometry {
        Geometry::Circle(c) => {
            let dx = local.x - c.center.x;
            let dy = local.y - c.center.y;
            dx * dx + dy * dy <= c.radius * c.radius
        }
        geometry => {
            let aabb = geometry.local_aabb();
            local.x >= aabb.lower.x
                && local.x <= aabb.upper.x
                && local.y >= aabb.lower.y
                && local.y <= aabb.upper.y
        }
    }
}

// --- Chain ---

pub(super) unsafe extern "C" fn chain_create(body_id: GrBodyId, def: *const GrChainDef) -> GrChainId {
    if def.is_null() {
        return GrChainId::NULL;
    }
    let def = unsafe { &*def };
    if def.magic != GR_DEF_MAGIC || def.points.is_null() || def.count < 2 {
        return GrChainId::NULL;
    }
    let points = unsafe { std::slice::from_raw_parts(def.points, def.count as usize) };

    let mut pool = table();
    let Some(world) = owner_mut(&mut pool, body_id.world) else {
        return GrChainId::NULL;
    };
    if world.bodies.get(body_id.index, body_id.generation).is_none() {
        return GrChainId::NULL;
    }

    let span_count = if def.is_loop != 0 {
        points.len()
    } else {
        points.len() - 1
    };
    let mut segments = Vec::with_capacity(span_count);
    for i in 0..span_count {
        let segment = GrSegment {
            point1: points[i],
            point2: points[(i + 1) % points.len()],
        };
        let shape = StubShape {
            body_index: body_id.index,
            filter: def.filter,
            density: 0.0,
            is_sensor: false,
            enable_sensor_events: false,
            enable_contact_events: true,
            enable_hit_events: false,
            enable_pre_solve_events: false,
            geometry: Geometry::Segment(segment),
        };
        let (index, _) = world.shapes.alloc(shape);
        segments.push(index);
    }

    let (index, generation) = world.chains.alloc(StubChain { segments });
    if let Some(body) = world.bodies.get_mut(body_id.index, body_id.generation) {
        body.chains.push(index);
    }
    GrChainId {
        index,
        world: body_id.world,
        generation,
    }
}

pub(super) unsafe extern "C" fn chain_destroy(id: GrChainId) {
    let mut pool = table();
    let Some(world) = owner_mut(&mut pool, id.world) else {
        return;
    };
    let Some(chain) = world.chains.free(id.index, id.generation) else {
        return;
    };
    for si in chain.segments {
        world.shapes.free_by_index(si);
    }
    for bi in world.bodies.live_indices() {
        if let Some(body) = world.bodies.get_by_index_mut(bi) {
            body.chains.retain(|&c| c != id.index);
        }
    }
}

pub(super) unsafe extern "C" fn chain_is_valid(id: GrChainId) -> bool {
    if id.is_null() {
        return false;
    }
    let mut pool = table();
    let Some(world) = owner_mut(&mut pool, id.world) else {
        return false;
    };
    world.chains.get(id.index, id.generation).is_some()
}

pub(super) unsafe extern "C" fn chain_segment_count(id: GrChainId) -> i32 {
    let mut pool = table();
    let Some(world) = owner_mut(&mut pool, id.world) else {
        return 0;
    };
    world
        .chains
        .get(id.index, id.generation)
        .map_or(0, |c| c.segments.len() as i32)
}

pub(super) unsafe extern "C" fn chain_get_segments(
    id: GrChainId,
    out: *mut GrShapeId,
    capacity: i32,
) -> i32 {
    let mut pool = table();
    let Some(world) = owner_mut(&mut pool, id.world) else {
        return 0;
    };
    let Some(chain) = world.chains.get(id.index, id.generation) else {
        return 0;
    };
    if out.is_null() || capacity <= 0 {
        return 0;
    }
    let mut written = 0usize;
    for &si in chain.segments.iter().take(capacity as usize) {
        let Some(generation) = world.shapes.generation_of(si) else {
            continue;
        };
        unsafe {
            out.add(written)
                .write(compose_shape_id(id.world, si, generation));
        }
        written += 1;
    }
    written as i32
}

// --- Joint ---

fn joint_create(world_id: GrWorldId, body_a: GrBodyId, body_b: GrBodyId) -> GrJointId {
    let mut pool = table();
    let Some(world) = world_mut(&mut pool, world_id) else {
        return GrJointId::NULL;
    };
    if world.bodies.get(body_a.index, body_a.generation).is_none()
        || world.bodies.get(body_b.index, body_b.generation).is_none()
    {
        return GrJointId::NULL;
    }
    let (index, generation) = world.joints.alloc(StubJoint { body_a, body_b });
    for id in [body_a, body_b] {
        if let Some(body) = world.bodies.get_mut(id.index, id.generation) {
            body.joints.push(index);
        }
    }
    GrJointId {
        index,
        world: world_id.index,
        generation,
    }
}

pub(super) unsafe extern "C" fn joint_create_distance(
    world_id: GrWorldId,
    def: *const GrDistanceJointDef,
) -> GrJointId {
    if def.is_null() {
        return GrJointId::NULL;
    }
    let def = unsafe { &*def };
    if def.magic != GR_DEF_MAGIC {
        return GrJointId::NULL;
    }
    joint_create(world_id, def.body_a, def.body_b)
}

pub(super) unsafe extern "C" fn joint_create_revolute(
    world_id: GrWorldId,
    def: *const GrRevoluteJointDef,
) -> GrJointId {
    if def.is_null() {
        return GrJointId::NULL;
    }
    let def = unsafe { &*def };
    if def.magic != GR_DEF_MAGIC {
        return GrJointId::NULL;
    }
    joint_create(world_id, def.body_a, def.body_b)
}

pub(super) unsafe extern "C" fn joint_destroy(id: GrJointId) {
    let mut pool = table();
    let Some(world) = owner_mut(&mut pool, id.world) else {
        return;
    };
    let Some(joint) = world.joints.free(id.index, id.generation) else {
        return;
    };
    for body_id in [joint.body_a, joint.body_b] {
        if let Some(body) = world.bodies.get_mut(body_id.index, body_id.generation) {
            body.joints.retain(|&j| j != id.index);
        }
    }
}

pub(super) unsafe extern "C" fn joint_is_valid(id: GrJointId) -> bool {
    if id.is_null() {
        return false;
    }
    let mut pool = table();
    let Some(world) = owner_mut(&mut pool, id.world) else {
        return false;
    };
    world.joints.get(id.index, id.generation).is_some()
}

pub(super) unsafe extern "C" fn joint_get_body_a(id: GrJointId) -> GrBodyId {
    let mut pool = table();
    let Some(world) = owner_mut(&mut pool, id.world) else {
        return GrBodyId::NULL;
    };
    world
        .joints
        .get(id.index, id.generation)
        .map_or(GrBodyId::NULL, |j| j.body_a)
}

pub(super) unsafe extern "C" fn joint_get_body_b(id: GrJointId) -> GrBodyId {
    let mut pool = table();
    let Some(world) = owner_mut(&mut pool, id.world) else {
        return GrBodyId::NULL;
    };
    world
        .joints
        .get(id.index, id.generation)
        .map_or(GrBodyId::NULL, |j| j.body_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_recycles_with_generation_bump() {
        let mut pool: Pool<u32> = Pool::new();
        let (i1, g1) = pool.alloc(10);
        assert_eq!(pool.get(i1, g1), Some(&10));

        assert_eq!(pool.free(i1, g1), Some(10));
        assert_eq!(pool.get(i1, g1), None, "freed slot must read as absent");

        let (i2, g2) = pool.alloc(20);
        assert_eq!(i2, i1, "slot is reused");
        assert_ne!(g2, g1, "generation advances on reuse");
        assert_eq!(pool.get(i1, g1), None, "stale generation stays invalid");
        assert_eq!(pool.get(i2, g2), Some(&20));
    }

    #[test]
    fn pool_rejects_double_free() {
        let mut pool: Pool<u32> = Pool::new();
        let (i, g) = pool.alloc(1);
        assert!(pool.free(i, g).is_some());
        assert!(pool.free(i, g).is_none());
    }

    #[test]
    fn world_create_rejects_uncookied_defs() {
        let mut def = GrWorldDef::default();
        def.magic = 0;
        let id = unsafe { world_create(&def) };
        assert!(id.is_null());
    }

    #[test]
    fn geometry_area() {
        let circle = Geometry::Circle(GrCircle {
            center: GrVec2::ZERO,
            radius: 1.0,
        });
        assert!((circle.area() - std::f32::consts::PI).abs() < 1.0e-5);

        let square = Geometry::Polygon(GrPolygon::make_box(1.0, 1.0));
        assert!((square.area() - 4.0).abs() < 1.0e-5);
    }
}
