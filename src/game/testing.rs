//! In-memory physics double for unit tests. Records every directive so
//! impulses and their ordering can be asserted exactly.

use nalgebra::Vector3;
use std::cell::RefCell;
use std::collections::HashMap;

use super::physics::{BodyPhysics, CollisionResponse, EntityId, QueryCategory, SceneHit, SceneQuery};

#[derive(Debug, Clone)]
pub struct FakeBody {
    pub position: Vector3<f32>,
    pub velocity: Vector3<f32>,
    pub mass: f32,
    pub gravity: bool,
    pub damping: f32,
    pub response: CollisionResponse,
    pub impulses: Vec<Vector3<f32>>,
    pub angular_impulses: Vec<Vector3<f32>>,
    pub point_impulses: Vec<(Vector3<f32>, Vector3<f32>)>,
    pub accelerations: Vec<Vector3<f32>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PhysicsCall {
    SetVelocity(EntityId, Vector3<f32>),
    VelocityImpulse(EntityId, Vector3<f32>),
    VelocityImpulseAtPoint(EntityId, Vector3<f32>, Vector3<f32>),
    Gravity(EntityId, bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SphereCastCall {
    pub origin: Vector3<f32>,
    pub direction: Vector3<f32>,
    pub radius: f32,
    pub max_distance: f32,
    pub category: QueryCategory,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RayCastCall {
    pub origin: Vector3<f32>,
    pub direction: Vector3<f32>,
    pub max_distance: f32,
    pub ignore: Vec<EntityId>,
}

#[derive(Debug, Default)]
pub struct RecordingPhysics {
    bodies: HashMap<EntityId, FakeBody>,
    pub calls: Vec<PhysicsCall>,
    pub sphere_hit: Option<SceneHit>,
    pub ray_hit: Option<SceneHit>,
    pub overlaps: Vec<EntityId>,
    pub sphere_casts: RefCell<Vec<SphereCastCall>>,
    pub ray_casts: RefCell<Vec<RayCastCall>>,
}

impl RecordingPhysics {
    pub const INITIAL_DAMPING: f32 = 0.5;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_body(&mut self, id: EntityId, position: Vector3<f32>, mass: f32) {
        self.bodies.insert(
            id,
            FakeBody {
                position,
                velocity: Vector3::zeros(),
                mass,
                gravity: true,
                damping: Self::INITIAL_DAMPING,
                response: CollisionResponse::Ignore,
                impulses: Vec::new(),
                angular_impulses: Vec::new(),
                point_impulses: Vec::new(),
                accelerations: Vec::new(),
            },
        );
    }

    pub fn body(&self, id: EntityId) -> &FakeBody {
        &self.bodies[&id]
    }
}

impl BodyPhysics for RecordingPhysics {
    fn position(&self, entity: EntityId) -> Option<Vector3<f32>> {
        self.bodies.get(&entity).map(|b| b.position)
    }

    fn set_position(&mut self, entity: EntityId, position: Vector3<f32>) {
        if let Some(b) = self.bodies.get_mut(&entity) {
            b.position = position;
        }
    }

    fn mass(&self, entity: EntityId) -> Option<f32> {
        self.bodies.get(&entity).map(|b| b.mass)
    }

    fn apply_velocity_impulse(&mut self, entity: EntityId, delta_v: Vector3<f32>) {
        if let Some(b) = self.bodies.get_mut(&entity) {
            b.velocity += delta_v;
            b.impulses.push(delta_v);
            self.calls.push(PhysicsCall::VelocityImpulse(entity, delta_v));
        }
    }

    fn apply_angular_impulse_degrees(&mut self, entity: EntityId, delta_w: Vector3<f32>) {
        if let Some(b) = self.bodies.get_mut(&entity) {
            b.angular_impulses.push(delta_w);
        }
    }

    fn apply_velocity_impulse_at_point(&mut self, entity: EntityId, delta_v: Vector3<f32>, point: Vector3<f32>) {
        if let Some(b) = self.bodies.get_mut(&entity) {
            b.velocity += delta_v;
            b.point_impulses.push((delta_v, point));
            self.calls.push(PhysicsCall::VelocityImpulseAtPoint(entity, delta_v, point));
        }
    }

    fn add_acceleration(&mut self, entity: EntityId, acceleration: Vector3<f32>) {
        if let Some(b) = self.bodies.get_mut(&entity) {
            b.accelerations.push(acceleration);
        }
    }

    fn set_gravity_enabled(&mut self, entity: EntityId, enabled: bool) {
        if let Some(b) = self.bodies.get_mut(&entity) {
            b.gravity = enabled;
            self.calls.push(PhysicsCall::Gravity(entity, enabled));
        }
    }

    fn set_linear_damping(&mut self, entity: EntityId, damping: f32) {
        if let Some(b) = self.bodies.get_mut(&entity) {
            b.damping = damping;
        }
    }

    fn set_linear_velocity(&mut self, entity: EntityId, velocity: Vector3<f32>) {
        if let Some(b) = self.bodies.get_mut(&entity) {
            b.velocity = velocity;
            self.calls.push(PhysicsCall::SetVelocity(entity, velocity));
        }
    }

    fn set_response_to_primary_props(&mut self, entity: EntityId, response: CollisionResponse) {
        if let Some(b) = self.bodies.get_mut(&entity) {
            b.response = response;
        }
    }
}

impl SceneQuery for RecordingPhysics {
    fn sphere_cast(
        &self,
        origin: Vector3<f32>,
        direction: Vector3<f32>,
        radius: f32,
        max_distance: f32,
        category: QueryCategory,
    ) -> Option<SceneHit> {
        self.sphere_casts.borrow_mut().push(SphereCastCall {
            origin,
            direction,
            radius,
            max_distance,
            category,
        });
        self.sphere_hit
    }

    fn ray_cast(
        &self,
        origin: Vector3<f32>,
        direction: Vector3<f32>,
        max_distance: f32,
        ignore: &[EntityId],
    ) -> Option<SceneHit> {
        self.ray_casts.borrow_mut().push(RayCastCall {
            origin,
            direction,
            max_distance,
            ignore: ignore.to_vec(),
        });
        self.ray_hit
    }

    fn overlap_sphere(&self, _center: Vector3<f32>, _radius: f32, _category: QueryCategory) -> Vec<EntityId> {
        self.overlaps.clone()
    }
}
