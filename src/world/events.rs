//! Event buffer draining.
//!
//! After each step the native side exposes three buffers of plain records
//! (contact, sensor, body) as (pointer, count) pairs, owned by the native
//! library and valid only until the next step. The drain walks them in place,
//! no copy and no ownership transfer, resolves the embedded handles through
//! the identity registry (materializing transients as needed; handles whose
//! object was destroyed since the step began stay out of the registry) and
//! invokes listeners synchronously, in array order, in the fixed buffer
//! order contact, then sensor, then body. Zero-count buffers invoke nothing.

use std::rc::Rc;

use glam::Vec2;
use log::trace;

use crate::body::Body;
use crate::shape::Shape;
use crate::views::Transform;

use super::World;

/// One contact hit record, with handles resolved to wrappers.
pub struct ContactHit {
    pub shape_a: Rc<Shape>,
    pub shape_b: Rc<Shape>,
    pub point: Vec2,
    pub normal: Vec2,
    pub approach_speed: f32,
}

pub trait ContactListener {
    fn begin_touch(&mut self, shape_a: &Rc<Shape>, shape_b: &Rc<Shape>);
    fn end_touch(&mut self, shape_a: &Rc<Shape>, shape_b: &Rc<Shape>);
    fn hit(&mut self, _hit: &ContactHit) {}
}

pub trait SensorListener {
    fn begin_touch(&mut self, sensor: &Rc<Shape>, visitor: &Rc<Shape>);
    fn end_touch(&mut self, sensor: &Rc<Shape>, visitor: &Rc<Shape>);
}

pub trait BodyListener {
    fn moved(&mut self, body: &Rc<Body>, transform: Transform, fell_asleep: bool);
}

/// Borrows a native record buffer in place. Null or empty descriptors yield
/// an empty slice rather than touching the pointer.
unsafe fn records<'a, T>(ptr: *const T, count: i32) -> &'a [T] {
    if ptr.is_null() || count <= 0 {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(ptr, count as usize) }
    }
}

impl World {
    pub(crate) fn drain_events(&mut self) {
        let core = self.core.clone();
        let api = &core.api;

        let contact = unsafe { (api.world_contact_events)(core.id) };
        trace!(
            "draining events: {} begin, {} end, {} hit",
            contact.begin_count,
            contact.end_count,
            contact.hit_count
        );
        for record in unsafe { records(contact.begin_events, contact.begin_count) } {
            let shape_a = core.resolve_event_shape(record.shape_a);
            let shape_b = core.resolve_event_shape(record.shape_b);
            for listener in &mut self.contact_listeners {
                listener.begin_touch(&shape_a, &shape_b);
            }
        }
        for record in unsafe { records(contact.end_events, contact.end_count) } {
            let shape_a = core.resolve_event_shape(record.shape_a);
            let shape_b = core.resolve_event_shape(record.shape_b);
            for listener in &mut self.contact_listeners {
                listener.end_touch(&shape_a, &shape_b);
            }
        }
        for record in unsafe { records(contact.hit_events, contact.hit_count) } {
            let hit = ContactHit {
                shape_a: core.resolve_event_shape(record.shape_a),
                shape_b: core.resolve_event_shape(record.shape_b),
                point: record.point.into(),
                normal: record.normal.into(),
                approach_speed: record.approach_speed,
            };
            for listener in &mut self.contact_listeners {
                listener.hit(&hit);
            }
        }

        let sensor = unsafe { (api.world_sensor_events)(core.id) };
        for record in unsafe { records(sensor.begin_events, sensor.begin_count) } {
            let sensor_shape = core.resolve_event_shape(record.sensor_shape);
            let visitor = core.resolve_event_shape(record.visitor_shape);
            for listener in &mut self.sensor_listeners {
                listener.begin_touch(&sensor_shape, &visitor);
            }
        }
        for record in unsafe { records(sensor.end_events, sensor.end_count) } {
            let sensor_shape = core.resolve_event_shape(record.sensor_shape);
            let visitor = core.resolve_event_shape(record.visitor_shape);
            for listener in &mut self.sensor_listeners {
                listener.end_touch(&sensor_shape, &visitor);
            }
        }

        let body_events = unsafe { (api.world_body_events)(core.id) };
        for record in unsafe { records(body_events.move_events, body_events.move_count) } {
            let body = core.resolve_event_body(record.body);
            let transform = Transform::from(record.transform);
            for listener in &mut self.body_listeners {
                listener.moved(&body, transform, record.fell_asleep != 0);
            }
        }
    }
}
