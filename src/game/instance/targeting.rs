use nalgebra::Vector3;

use crate::config::TargetingConfig;
use crate::game::holder::Viewpoint;
use crate::game::physics::{EntityId, QueryCategory, SceneQuery};

/// Outcome of re-evaluating a holder's highlighted target for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetChange {
    Keep,
    Switch {
        previous: Option<EntityId>,
        next: EntityId,
    },
    Clear {
        previous: EntityId,
    },
}

/// Casts the detection sphere along the view direction and returns the nearest
/// primary prop. The cast starts one radius ahead so it does not begin behind
/// the camera.
pub fn detect_target<Q: SceneQuery + ?Sized>(
    query: &Q,
    viewpoint: &Viewpoint,
    config: &TargetingConfig,
) -> Option<EntityId> {
    let radius = config.detection_radius;
    let start = viewpoint.point_at(radius);
    let distance = (config.detection_distance - radius).max(0.0);
    query
        .sphere_cast(start, viewpoint.forward, radius, distance, QueryCategory::PrimaryProp)
        .map(|hit| hit.entity)
}

/// Compares the current highlight against this tick's hit
pub fn evaluate(current: Option<EntityId>, hit: Option<EntityId>) -> TargetChange {
    match (current, hit) {
        (current, Some(next)) if current != Some(next) => TargetChange::Switch {
            previous: current,
            next,
        },
        (_, Some(_)) => TargetChange::Keep,
        (Some(previous), None) => TargetChange::Clear { previous },
        (None, None) => TargetChange::Keep,
    }
}

/// Where a throw should go: the first surface along the view ray, or the end
/// of the ray when nothing is in the way.
pub fn throw_destination<Q: SceneQuery + ?Sized>(
    query: &Q,
    viewpoint: &Viewpoint,
    ignore: &[EntityId],
    config: &TargetingConfig,
) -> Vector3<f32> {
    let distance = config.throw_trace_distance;
    query
        .ray_cast(viewpoint.origin, viewpoint.forward, distance, ignore)
        .map(|hit| hit.point)
        .unwrap_or_else(|| viewpoint.point_at(distance))
}
