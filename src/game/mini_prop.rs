use nalgebra::Vector3;
use std::collections::HashMap;

use super::physics::{BodyPhysics, EntityId};

/// Lightweight prop that gets swept around a held primary prop.
/// Passive: it only reacts to what the attraction set asks of it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MiniProp {
    pub id: EntityId,
    /// Acceleration toward the primary prop while attracted
    pub attraction_force: f32,
}

/// Live mini props keyed by entity id
pub type MiniPropRegistry = HashMap<EntityId, MiniProp>;

impl MiniProp {
    pub fn new(id: EntityId, attraction_force: f32) -> Self {
        Self { id, attraction_force }
    }

    /// Pulls along `direction` (unit length), scaled by mass in the physics layer
    pub fn attract<P: BodyPhysics + ?Sized>(&self, physics: &mut P, direction: Vector3<f32>) {
        physics.add_acceleration(self.id, direction * self.attraction_force);
    }
}
