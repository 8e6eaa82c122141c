//! End-to-end tests of the bridge contract against the embedded reference
//! backend: identity preservation, registry lifecycle, event draining, the
//! staleness model and bulk-query clamping.

#![cfg(feature = "embedded-backend")]

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec2;

use granite2d::{
    Body, BodyListener, ContactListener, GrBodyDef, GrBodyType, GrCircle, GrDistanceJointDef,
    GrPolygon, GrSegment, GrShapeDef, GrShapeId, GrVec2, NativeApi, SensorListener, Shape,
    Transform, WorkerPool, World, WorldDef,
};

fn world() -> World {
    World::create(NativeApi::embedded(), &WorldDef::default()).unwrap()
}

fn dynamic_body_def(x: f32, y: f32) -> GrBodyDef {
    GrBodyDef {
        body_type: GrBodyType::Dynamic,
        position: GrVec2::new(x, y),
        ..GrBodyDef::default()
    }
}

fn circle(radius: f32) -> GrCircle {
    GrCircle {
        center: GrVec2::ZERO,
        radius,
    }
}

#[test]
fn registry_is_empty_after_out_of_order_destruction() {
    let world = world();

    let a = world.create_body(&dynamic_body_def(0.0, 0.0)).unwrap();
    let b = world.create_body(&dynamic_body_def(5.0, 0.0)).unwrap();
    let c = world.create_body(&dynamic_body_def(10.0, 0.0)).unwrap();

    let shape_a = a.create_circle(&GrShapeDef::default(), &circle(0.5)).unwrap();
    let _shape_b = b.create_circle(&GrShapeDef::default(), &circle(0.5)).unwrap();

    let joint = world
        .create_distance_joint(&GrDistanceJointDef {
            body_a: a.id(),
            body_b: b.id(),
            ..GrDistanceJointDef::default()
        })
        .unwrap();

    assert_eq!(world.registered_wrappers(), 6);

    // Shape first, then a body holding the joint, then the rest.
    shape_a.destroy();
    b.destroy();
    assert!(!joint.is_valid(), "joint dies with its body");
    a.destroy();
    c.destroy();

    assert_eq!(world.registered_wrappers(), 0);
    world.destroy();
}

#[test]
fn resolution_returns_the_wrapper_the_embedder_holds() {
    let world = world();
    let body = world.create_body(&dynamic_body_def(0.0, 0.0)).unwrap();
    let shape = body.create_circle(&GrShapeDef::default(), &circle(1.0)).unwrap();

    // Relationship queries resolve through the registry, not fresh wrappers.
    let via_shape = shape.body().unwrap();
    assert!(Rc::ptr_eq(&via_shape, &body));

    let via_enumeration = &body.shapes()[0];
    assert!(Rc::ptr_eq(via_enumeration, &shape));

    // Resolution is idempotent.
    let again = &body.shapes()[0];
    assert!(Rc::ptr_eq(again, via_enumeration));

    body.destroy();
    world.destroy();
}

#[derive(Default)]
struct ContactRecorder {
    begins: Rc<RefCell<Vec<(GrShapeId, GrShapeId)>>>,
    ends: Rc<RefCell<Vec<(GrShapeId, GrShapeId)>>>,
}

impl ContactListener for ContactRecorder {
    fn begin_touch(&mut self, a: &Rc<Shape>, b: &Rc<Shape>) {
        self.begins.borrow_mut().push((a.id(), b.id()));
    }
    fn end_touch(&mut self, a: &Rc<Shape>, b: &Rc<Shape>) {
        self.ends.borrow_mut().push((a.id(), b.id()));
    }
}

#[test]
fn zero_event_step_invokes_no_listener() {
    let mut world = world();
    let recorder = ContactRecorder::default();
    let begins = recorder.begins.clone();
    world.add_contact_listener(Box::new(recorder));

    // Two bodies far apart: no events at all.
    let a = world.create_body(&dynamic_body_def(0.0, 0.0)).unwrap();
    let b = world.create_body(&dynamic_body_def(100.0, 0.0)).unwrap();
    a.create_circle(&GrShapeDef::default(), &circle(0.5)).unwrap();
    b.create_circle(&GrShapeDef::default(), &circle(0.5)).unwrap();
    world.set_gravity(Vec2::ZERO);

    world.step(1.0 / 60.0, 4);
    assert!(begins.borrow().is_empty());
    world.destroy();
}

#[test]
fn each_begin_touch_record_invokes_one_callback() {
    let mut world = world();
    world.set_gravity(Vec2::ZERO);

    let recorder = ContactRecorder::default();
    let begins = recorder.begins.clone();
    world.add_contact_listener(Box::new(recorder));

    // Three disjoint overlapping pairs, far from one another.
    for i in 0..3 {
        let x = i as f32 * 100.0;
        let a = world.create_body(&dynamic_body_def(x, 0.0)).unwrap();
        let b = world.create_body(&dynamic_body_def(x + 0.5, 0.0)).unwrap();
        a.create_circle(&GrShapeDef::default(), &circle(0.5)).unwrap();
        b.create_circle(&GrShapeDef::default(), &circle(0.5)).unwrap();
    }

    world.step(1.0 / 60.0, 4);

    let begins = begins.borrow();
    assert_eq!(begins.len(), 3, "one callback per begin-touch record");
    for window in begins.windows(2) {
        assert_ne!(window[0], window[1], "records carry distinct pairs");
    }
    world.destroy();
}

#[test]
fn separating_bodies_produce_end_touch() {
    let mut world = world();
    world.set_gravity(Vec2::ZERO);

    let recorder = ContactRecorder::default();
    let begins = recorder.begins.clone();
    let ends = recorder.ends.clone();
    world.add_contact_listener(Box::new(recorder));

    let a = world.create_body(&dynamic_body_def(0.0, 0.0)).unwrap();
    let b = world.create_body(&dynamic_body_def(0.5, 0.0)).unwrap();
    a.create_circle(&GrShapeDef::default(), &circle(0.5)).unwrap();
    b.create_circle(&GrShapeDef::default(), &circle(0.5)).unwrap();

    world.step(1.0 / 60.0, 4);
    assert_eq!(begins.borrow().len(), 1);

    b.set_transform(Transform {
        position: Vec2::new(50.0, 0.0),
        ..Transform::IDENTITY
    });
    world.step(1.0 / 60.0, 4);
    assert_eq!(ends.borrow().len(), 1);
    assert_eq!(begins.borrow()[0], ends.borrow()[0]);
    world.destroy();
}

#[test]
fn destroying_a_touching_shape_leaves_the_registry_clean() {
    let mut world = world();
    world.set_gravity(Vec2::ZERO);

    let a = world.create_body(&dynamic_body_def(0.0, 0.0)).unwrap();
    let b = world.create_body(&dynamic_body_def(0.5, 0.0)).unwrap();
    let sa = a.create_circle(&GrShapeDef::default(), &circle(0.5)).unwrap();
    let _sb = b.create_circle(&GrShapeDef::default(), &circle(0.5)).unwrap();

    world.step(1.0 / 60.0, 4);

    // The next step's end-touch record names a handle that no longer has an
    // object behind it; draining it must not re-enter the destroyed shape,
    // listeners or not.
    sa.destroy();
    world.step(1.0 / 60.0, 4);

    a.destroy();
    b.destroy();
    assert_eq!(world.registered_wrappers(), 0);
    world.destroy();
}

struct SensorRecorder {
    begins: Rc<RefCell<Vec<(GrShapeId, GrShapeId)>>>,
}

impl SensorListener for SensorRecorder {
    fn begin_touch(&mut self, sensor: &Rc<Shape>, visitor: &Rc<Shape>) {
        self.begins.borrow_mut().push((sensor.id(), visitor.id()));
    }
    fn end_touch(&mut self, _sensor: &Rc<Shape>, _visitor: &Rc<Shape>) {}
}

#[test]
fn sensor_overlap_reports_sensor_and_visitor() {
    let mut world = world();
    world.set_gravity(Vec2::ZERO);

    let begins = Rc::new(RefCell::new(Vec::new()));
    world.add_sensor_listener(Box::new(SensorRecorder {
        begins: begins.clone(),
    }));

    let trigger = world.create_body(&GrBodyDef::default()).unwrap();
    let sensor_def = GrShapeDef {
        is_sensor: 1,
        ..GrShapeDef::default()
    };
    let sensor = trigger.create_circle(&sensor_def, &circle(2.0)).unwrap();

    let visitor_body = world.create_body(&dynamic_body_def(0.5, 0.0)).unwrap();
    let visitor = visitor_body
        .create_circle(&GrShapeDef::default(), &circle(0.5))
        .unwrap();

    world.step(1.0 / 60.0, 4);

    let begins = begins.borrow();
    assert_eq!(begins.len(), 1);
    assert_eq!(begins[0], (sensor.id(), visitor.id()));
    world.destroy();
}

struct OrderRecorder {
    log: Rc<RefCell<Vec<&'static str>>>,
}

impl ContactListener for OrderRecorder {
    fn begin_touch(&mut self, _a: &Rc<Shape>, _b: &Rc<Shape>) {
        self.log.borrow_mut().push("contact");
    }
    fn end_touch(&mut self, _a: &Rc<Shape>, _b: &Rc<Shape>) {
        self.log.borrow_mut().push("contact");
    }
}

impl SensorListener for OrderRecorder {
    fn begin_touch(&mut self, _sensor: &Rc<Shape>, _visitor: &Rc<Shape>) {
        self.log.borrow_mut().push("sensor");
    }
    fn end_touch(&mut self, _sensor: &Rc<Shape>, _visitor: &Rc<Shape>) {
        self.log.borrow_mut().push("sensor");
    }
}

impl BodyListener for OrderRecorder {
    fn moved(&mut self, _body: &Rc<Body>, _transform: Transform, _fell_asleep: bool) {
        self.log.borrow_mut().push("body");
    }
}

#[test]
fn listeners_fire_in_contact_sensor_body_order() {
    let mut world = world();
    world.set_gravity(Vec2::ZERO);

    let log = Rc::new(RefCell::new(Vec::new()));
    world.add_contact_listener(Box::new(OrderRecorder { log: log.clone() }));
    world.add_sensor_listener(Box::new(OrderRecorder { log: log.clone() }));
    world.add_body_listener(Box::new(OrderRecorder { log: log.clone() }));

    // One contact pair, one sensor overlap and one moving body, so a single
    // step fills all three buffers.
    let a = world.create_body(&dynamic_body_def(0.0, 0.0)).unwrap();
    let b = world.create_body(&dynamic_body_def(0.5, 0.0)).unwrap();
    a.create_circle(&GrShapeDef::default(), &circle(0.5)).unwrap();
    b.create_circle(&GrShapeDef::default(), &circle(0.5)).unwrap();

    let trigger = world
        .create_body(&GrBodyDef {
            position: GrVec2::new(50.0, 0.0),
            ..GrBodyDef::default()
        })
        .unwrap();
    let sensor_def = GrShapeDef {
        is_sensor: 1,
        ..GrShapeDef::default()
    };
    trigger.create_circle(&sensor_def, &circle(2.0)).unwrap();
    let visitor = world.create_body(&dynamic_body_def(50.5, 0.0)).unwrap();
    visitor.create_circle(&GrShapeDef::default(), &circle(0.5)).unwrap();

    let mover = world.create_body(&dynamic_body_def(100.0, 0.0)).unwrap();
    mover.set_linear_velocity(Vec2::new(1.0, 0.0));

    world.step(1.0 / 60.0, 4);

    let log = log.borrow();
    assert!(log.contains(&"contact"));
    assert!(log.contains(&"sensor"));
    assert!(log.contains(&"body"));
    let last_contact = log.iter().rposition(|&e| e == "contact").unwrap();
    let first_sensor = log.iter().position(|&e| e == "sensor").unwrap();
    let last_sensor = log.iter().rposition(|&e| e == "sensor").unwrap();
    let first_body = log.iter().position(|&e| e == "body").unwrap();
    assert!(last_contact < first_sensor, "contact callbacks precede sensor callbacks");
    assert!(last_sensor < first_body, "sensor callbacks precede body-move callbacks");
    world.destroy();
}

struct MoveRecorder {
    bodies: Rc<RefCell<Vec<Rc<Body>>>>,
    transforms: Rc<RefCell<Vec<Transform>>>,
}

impl BodyListener for MoveRecorder {
    fn moved(&mut self, body: &Rc<Body>, transform: Transform, _fell_asleep: bool) {
        self.bodies.borrow_mut().push(body.clone());
        self.transforms.borrow_mut().push(transform);
    }
}

#[test]
fn ninety_step_fall_keeps_one_wrapper_identity() {
    let mut world = world();

    let ground = world
        .create_body(&GrBodyDef {
            position: GrVec2::new(0.0, -10.0),
            ..GrBodyDef::default()
        })
        .unwrap();
    ground
        .create_polygon(&GrShapeDef::default(), &GrPolygon::make_box(50.0, 1.0))
        .unwrap();

    let falling = world.create_body(&dynamic_body_def(0.0, 4.0)).unwrap();
    falling
        .create_circle(&GrShapeDef::default(), &circle(0.5))
        .unwrap();

    let bodies = Rc::new(RefCell::new(Vec::new()));
    let transforms = Rc::new(RefCell::new(Vec::new()));
    world.add_body_listener(Box::new(MoveRecorder {
        bodies: bodies.clone(),
        transforms: transforms.clone(),
    }));

    for _ in 0..90 {
        world.step(1.0 / 60.0, 4);
    }

    let bodies = bodies.borrow();
    assert!(!bodies.is_empty(), "a falling body reports move events");
    for resolved in bodies.iter() {
        assert!(
            Rc::ptr_eq(resolved, &falling),
            "every move event resolves to the one wrapper"
        );
    }
    assert!(falling.position().y < 4.0, "gravity pulled the body down");
    assert!(falling.is_valid());

    // Reported transforms trace a monotone fall.
    let transforms = transforms.borrow();
    for window in transforms.windows(2) {
        assert!(window[1].position.y <= window[0].position.y);
    }
    world.destroy();
}

#[test]
fn destroying_a_body_stales_its_shapes() {
    let world = world();
    let body = world.create_body(&dynamic_body_def(0.0, 0.0)).unwrap();
    let first = body.create_circle(&GrShapeDef::default(), &circle(0.5)).unwrap();
    let second = body
        .create_segment(
            &GrShapeDef::default(),
            &GrSegment {
                point1: GrVec2::new(-1.0, 0.0),
                point2: GrVec2::new(1.0, 0.0),
            },
        )
        .unwrap();

    let body_id = body.id();
    body.destroy();

    assert_eq!(world.registered_wrappers(), 0);
    assert!(!body.is_valid());
    assert!(!first.is_valid());
    assert!(!second.is_valid());

    // Recreating reuses the slot under a fresh generation; the stale handle
    // stays invalid.
    let replacement = world.create_body(&dynamic_body_def(0.0, 0.0)).unwrap();
    assert!(replacement.is_valid());
    assert!(!unsafe { (NativeApi::embedded().body_is_valid)(body_id) });
    replacement.destroy();
    world.destroy();
}

#[test]
fn bulk_query_clamps_to_capacity_and_leaves_the_rest_untouched() {
    let world = world();
    let body = world.create_body(&dynamic_body_def(0.0, 0.0)).unwrap();
    for _ in 0..6 {
        body.create_circle(&GrShapeDef::default(), &circle(0.5)).unwrap();
    }
    assert_eq!(body.shape_count(), 6);

    let sentinel = GrShapeId {
        index: -1,
        world: 0xBEEF,
        generation: 0x7777,
    };
    let mut out = [sentinel; 6];
    let api = NativeApi::embedded();
    let written = unsafe { (api.body_get_shapes)(body.id(), out.as_mut_ptr(), 4) };

    assert_eq!(written, 4);
    for id in &out[..4] {
        assert_ne!(*id, sentinel);
        assert!(!id.is_null());
    }
    for id in &out[4..] {
        assert_eq!(*id, sentinel, "slots past the written count are untouched");
    }

    // The safe wrapper sizes its buffer from the count query.
    assert_eq!(body.shapes().len(), 6);
    body.destroy();
    world.destroy();
}

#[test]
fn chain_segments_enumerate_and_destroy() {
    let world = world();
    let body = world.create_body(&GrBodyDef::default()).unwrap();
    let points = [
        GrVec2::new(-2.0, 0.0),
        GrVec2::new(-1.0, 0.5),
        GrVec2::new(0.0, 0.0),
        GrVec2::new(1.0, 0.5),
    ];
    let chain = body
        .create_chain(&granite2d::ChainDef::new(&points))
        .unwrap();

    assert!(chain.is_valid());
    assert_eq!(chain.segment_count(), 3, "an open chain has count-1 spans");
    let segments = chain.segments();
    assert_eq!(segments.len(), 3);
    assert!(segments.iter().all(|s| s.is_valid()));

    chain.destroy();
    assert!(!chain.is_valid());
    assert!(segments.iter().all(|s| !s.is_valid()));

    body.destroy();
    assert_eq!(world.registered_wrappers(), 0);
    world.destroy();
}

#[test]
fn stepping_runs_through_a_lent_worker_pool() {
    let pool = std::sync::Arc::new(WorkerPool::new(2));
    let mut world = World::create(
        NativeApi::embedded(),
        &WorldDef {
            workers: Some(pool),
            ..WorldDef::default()
        },
    )
    .unwrap();

    let body = world.create_body(&dynamic_body_def(0.0, 10.0)).unwrap();
    body.create_circle(&GrShapeDef::default(), &circle(0.5)).unwrap();

    for _ in 0..30 {
        world.step(1.0 / 60.0, 4);
    }
    assert!(body.position().y < 10.0);
    world.destroy();
}

#[test]
fn shape_payloads_survive_transient_materialization() {
    let world = world();
    let body = world.create_body(&dynamic_body_def(0.0, 0.0)).unwrap();
    let shape = body.create_circle(&GrShapeDef::default(), &circle(0.5)).unwrap();
    shape.set_user_data(Some(Box::new(String::from("player"))));

    // Re-resolve through the relationship query; the payload is keyed by
    // handle, not by wrapper instance.
    let resolved = &body.shapes()[0];
    resolved.with_user_data(|d| {
        assert_eq!(
            d.and_then(|a| a.downcast_ref::<String>()).map(String::as_str),
            Some("player")
        );
    });

    body.destroy();
    world.destroy();
}
