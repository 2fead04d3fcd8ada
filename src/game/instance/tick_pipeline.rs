use tracing::trace;

use super::targeting::{self, TargetChange};
use super::TelekinesisInstance;
use crate::game::physics::PhysicsEvent;
use crate::game::prop::{Interactable, ReachTarget};
use crate::game::scheduler::PhaseKind;

/// Executes simulation phases for one tick.
/// input -> targeting -> clock -> phase timers -> physics -> contact/overlap handlers.
pub(super) fn run_tick_phases(instance: &mut TelekinesisInstance, dt: f32) {
    // Inputs queued since the last tick.
    while let Ok(queued) = instance.input_receiver.try_recv() {
        instance.process_input(queued);
    }

    // Attraction forces only last one step.
    instance.physics.clear_accelerations();

    // Casts must see bodies spawned or moved since the last step.
    instance.physics.update_queries();

    // Targeting runs for every holder, holding or not.
    update_targeting(instance);

    instance.time += dt as f64;

    // Lift and Reach callbacks.
    dispatch_due_timers(instance);

    instance.physics.step(dt);

    // Contacts and attraction field overlaps from this step.
    dispatch_physics_events(instance);
}

fn update_targeting(instance: &mut TelekinesisInstance) {
    let mut holder_ids: Vec<_> = instance.holders.keys().copied().collect();
    holder_ids.sort_unstable();

    for holder_id in holder_ids {
        let Some(holder) = instance.holders.get(&holder_id) else {
            continue;
        };
        let hit = targeting::detect_target(&instance.physics, &holder.viewpoint(), &instance.config.targeting)
            .filter(|id| instance.props.contains_key(id));

        match targeting::evaluate(holder.highlighted(), hit) {
            TargetChange::Keep => {}
            TargetChange::Switch { previous, next } => {
                if let Some(prop) = previous.and_then(|id| instance.props.get_mut(&id)) {
                    prop.set_highlighted(false, &mut instance.events);
                }
                if let Some(prop) = instance.props.get_mut(&next) {
                    prop.set_highlighted(true, &mut instance.events);
                }
                if let Some(holder) = instance.holders.get_mut(&holder_id) {
                    holder.set_highlighted(Some(next));
                }
            }
            TargetChange::Clear { previous } => {
                if let Some(prop) = instance.props.get_mut(&previous) {
                    prop.set_highlighted(false, &mut instance.events);
                }
                if let Some(holder) = instance.holders.get_mut(&holder_id) {
                    holder.set_highlighted(None);
                }
            }
        }
    }
}

fn dispatch_due_timers(instance: &mut TelekinesisInstance) {
    let due = instance.scheduler.collect_due(instance.time);
    for timer in due {
        // A callback earlier in this tick may have cancelled it
        if !instance.scheduler.is_active(timer.id) {
            continue;
        }
        let (props, holders, mut ctx) = instance.split();
        let Some(prop) = props.get_mut(&timer.owner) else {
            continue;
        };
        match timer.phase {
            PhaseKind::Lift => {
                trace!(prop = timer.owner, "lift timer");
                prop.lift_tick(&mut ctx);
            }
            PhaseKind::Reach => {
                let target = match prop.reach_target() {
                    ReachTarget::Point(point) => Some(point),
                    ReachTarget::HolderAnchor => prop
                        .holder()
                        .and_then(|id| holders.get(&id))
                        .and_then(|holder| {
                            ctx.physics
                                .position(holder.id())
                                .map(|position| holder.anchor_point(position))
                        }),
                };
                prop.reach_tick(target, &mut ctx);
            }
        }
    }
}

fn dispatch_physics_events(instance: &mut TelekinesisInstance) {
    for event in instance.physics.drain_events() {
        let (props, _, mut ctx) = instance.split();
        match event {
            PhysicsEvent::Contact {
                entity,
                point,
                normal,
                ..
            } => {
                if let Some(prop) = props.get_mut(&entity) {
                    prop.handle_contact(point, normal, &mut ctx);
                }
            }
            PhysicsEvent::FieldEntered { owner, other } => {
                if let Some(prop) = props.get_mut(&owner) {
                    prop.on_field_entered(other, &mut ctx);
                }
            }
            PhysicsEvent::FieldExited { owner, other } => {
                if let Some(prop) = props.get_mut(&owner) {
                    prop.on_field_exited(other, &mut ctx);
                }
            }
        }
    }
}
