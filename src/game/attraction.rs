use nalgebra::Vector3;
use tracing::debug;

use super::constants::physics::EPSILON;
use super::mini_prop::MiniPropRegistry;
use super::physics::{BodyPhysics, CollisionResponse, EntityId};
use crate::config::AttractionConfig;

/// Mini props currently orbiting a held primary prop, in insertion order.
#[derive(Debug, Default, Clone)]
pub struct AttractionSet {
    members: Vec<EntityId>,
}

impl AttractionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn members(&self) -> &[EntityId] {
        &self.members
    }

    pub fn contains(&self, mini: EntityId) -> bool {
        self.members.contains(&mini)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Adds a mini prop: floats it and lets it rest against the primary prop.
    /// Returns false if it was already a member (nothing changes).
    pub fn recruit<P: BodyPhysics + ?Sized>(&mut self, mini: EntityId, physics: &mut P, config: &AttractionConfig) -> bool {
        if self.contains(mini) {
            return false;
        }
        self.members.push(mini);
        physics.set_gravity_enabled(mini, false);
        physics.set_linear_damping(mini, config.held_linear_damping);
        physics.set_response_to_primary_props(mini, CollisionResponse::Block);
        debug!(mini, "mini prop recruited");
        true
    }

    /// Removes a mini prop that left the field and lets it fall again.
    /// Non-members are ignored.
    pub fn dismiss<P: BodyPhysics + ?Sized>(&mut self, mini: EntityId, physics: &mut P, config: &AttractionConfig) -> bool {
        let Some(index) = self.members.iter().position(|&m| m == mini) else {
            return false;
        };
        self.members.remove(index);
        physics.set_gravity_enabled(mini, true);
        physics.set_linear_damping(mini, config.resting_linear_damping);
        debug!(mini, "mini prop dismissed");
        true
    }

    /// Lets go of every member regardless of overlap, so none of them collide
    /// with the outgoing primary prop. Returns the released ids.
    pub fn release_all<P: BodyPhysics + ?Sized>(&mut self, physics: &mut P, config: &AttractionConfig) -> Vec<EntityId> {
        let released = std::mem::take(&mut self.members);
        for &mini in &released {
            physics.set_response_to_primary_props(mini, CollisionResponse::Ignore);
            physics.set_gravity_enabled(mini, true);
            physics.set_linear_damping(mini, config.resting_linear_damping);
        }
        if !released.is_empty() {
            debug!(count = released.len(), "mini props released");
        }
        released
    }

    /// Drops a despawned mini prop without touching physics
    pub fn forget(&mut self, mini: EntityId) -> bool {
        let before = self.members.len();
        self.members.retain(|&m| m != mini);
        before != self.members.len()
    }

    /// Pulls every member toward `center`. Only the direction matters, not the distance.
    pub fn attract<P: BodyPhysics + ?Sized>(&self, center: Vector3<f32>, physics: &mut P, minis: &MiniPropRegistry) {
        for mini_id in &self.members {
            let Some(mini) = minis.get(mini_id) else {
                continue;
            };
            let Some(position) = physics.position(*mini_id) else {
                continue;
            };
            let direction = (center - position)
                .try_normalize(EPSILON)
                .unwrap_or_else(Vector3::zeros);
            mini.attract(&mut *physics, direction);
        }
    }
}
