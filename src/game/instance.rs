use crossbeam_channel::{Receiver, Sender};
use nalgebra::{Vector2, Vector3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::frame_event::FrameEvent;
use super::holder::{Holder, Viewpoint};
use super::mini_prop::{MiniProp, MiniPropRegistry};
use super::physics::{EntityId, PhysicsWorld};
use super::prop::{Interactable, PrimaryProp, PropContext};
use super::scheduler::PhaseScheduler;
use crate::config::TelekinesisConfig;

mod targeting;
mod tick_pipeline;

pub use targeting::TargetChange;

/// A telekinesis sandbox world: props, mini props and holders on top of a
/// Rapier physics world, driven at a fixed rate by `tick`.
pub struct TelekinesisInstance {
    pub config: TelekinesisConfig,
    pub physics: PhysicsWorld,
    pub tick: u64,
    time: f64,
    scheduler: PhaseScheduler,
    props: HashMap<EntityId, PrimaryProp>,
    minis: MiniPropRegistry,
    holders: HashMap<EntityId, Holder>,
    rng: StdRng,
    events: Vec<FrameEvent>,
    next_entity: EntityId,
    input_receiver: Receiver<QueuedInput>,
    input_sender: Sender<QueuedInput>,
}

/// An input queued for a holder
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueuedInput {
    pub holder: EntityId,
    pub input: HolderInput,
}

/// Inputs a holder can receive
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HolderInput {
    /// Trigger pressed: pull the highlighted prop, or throw the held one
    Interact,
    /// Control yaw in radians
    Look { yaw: f32 },
    /// World-space movement axes (x, z)
    Move { axes: [f32; 2] },
}

/// What an interact trigger did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InteractOutcome {
    Pulled(EntityId),
    Pushed {
        prop: EntityId,
        destination: Vector3<f32>,
    },
    Ignored,
}

impl TelekinesisInstance {
    /// Creates an empty world seeded from system entropy
    pub fn new(config: TelekinesisConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Creates an empty world with deterministic jitter and spin
    pub fn with_seed(config: TelekinesisConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: TelekinesisConfig, rng: StdRng) -> Self {
        let (input_sender, input_receiver) = crossbeam_channel::unbounded();
        let mut physics = PhysicsWorld::new();
        physics.set_gravity(config.physics.gravity);

        Self {
            config,
            physics,
            tick: 0,
            time: 0.0,
            scheduler: PhaseScheduler::new(),
            props: HashMap::new(),
            minis: MiniPropRegistry::new(),
            holders: HashMap::new(),
            rng,
            events: Vec::new(),
            next_entity: 1,
            input_receiver,
            input_sender,
        }
    }

    /// Simulation time in seconds
    pub fn time(&self) -> f64 {
        self.time
    }

    fn allocate_id(&mut self) -> EntityId {
        let id = self.next_entity;
        self.next_entity += 1;
        id
    }

    /// Adds fixed box geometry (floors, walls)
    pub fn spawn_static_box(&mut self, position: Vector3<f32>, half_extents: Vector3<f32>) -> EntityId {
        let id = self.allocate_id();
        self.physics.add_static_box(id, position, half_extents);
        id
    }

    pub fn spawn_primary_prop(&mut self, position: Vector3<f32>, half_extents: Vector3<f32>, mass: f32) -> EntityId {
        let id = self.allocate_id();
        self.physics.add_primary_prop(
            id,
            position,
            half_extents,
            mass,
            self.config.attraction.field_radius,
            self.config.reach.resting_linear_damping,
        );
        self.props.insert(id, PrimaryProp::new(id));
        debug!(prop = id, mass, "spawned primary prop");
        id
    }

    /// Adds a mini prop. `attraction_force` defaults to the configured force.
    pub fn spawn_mini_prop(
        &mut self,
        position: Vector3<f32>,
        radius: f32,
        mass: f32,
        attraction_force: Option<f32>,
    ) -> EntityId {
        let id = self.allocate_id();
        self.physics.add_mini_prop(
            id,
            position,
            radius,
            mass,
            self.config.attraction.resting_linear_damping,
        );
        let force = attraction_force.unwrap_or(self.config.attraction.force);
        self.minis.insert(id, MiniProp::new(id, force));
        id
    }

    pub fn spawn_holder(&mut self, position: Vector3<f32>) -> EntityId {
        let id = self.allocate_id();
        self.physics.add_holder(id, position);
        self.holders.insert(id, Holder::new(id, &self.config));
        debug!(holder = id, "spawned holder");
        id
    }

    /// Removes any entity. Ids still held elsewhere resolve to nothing afterwards.
    pub fn despawn(&mut self, entity: EntityId) -> bool {
        let mut found = false;

        if let Some(mut prop) = self.props.remove(&entity) {
            // Minis orbiting a vanished prop must not stay weightless
            prop.release_attracted(&mut self.physics, &self.config);
            self.scheduler.clear_owner(entity);
            for holder in self.holders.values_mut() {
                holder.forget(entity);
            }
            found = true;
        }
        if self.minis.remove(&entity).is_some() {
            for prop in self.props.values_mut() {
                prop.forget_mini(entity);
            }
            found = true;
        }
        if self.holders.remove(&entity).is_some() {
            for prop in self.props.values_mut() {
                prop.forget_holder(entity);
            }
            found = true;
        }

        let removed = self.physics.remove(entity);
        if found || removed {
            debug!(entity, "despawned");
        }
        found || removed
    }

    pub fn prop(&self, id: EntityId) -> Option<&PrimaryProp> {
        self.props.get(&id)
    }

    pub fn holder(&self, id: EntityId) -> Option<&Holder> {
        self.holders.get(&id)
    }

    pub fn is_mini_prop(&self, id: EntityId) -> bool {
        self.minis.contains_key(&id)
    }

    pub fn active_timer_count(&self) -> usize {
        self.scheduler.active_count()
    }

    /// Updates a holder's camera viewpoint for the next targeting pass
    pub fn set_viewpoint(&mut self, holder: EntityId, viewpoint: Viewpoint) {
        match self.holders.get_mut(&holder) {
            Some(h) => h.set_viewpoint(viewpoint),
            None => warn!(holder, "viewpoint for unknown holder"),
        }
    }

    /// Moves a holder's body. The anchor point follows.
    pub fn set_holder_position(&mut self, holder: EntityId, position: Vector3<f32>) {
        if !self.holders.contains_key(&holder) {
            warn!(holder, "position for unknown holder");
            return;
        }
        self.physics.set_holder_position(holder, position);
    }

    /// Queues an input for processing at the start of the next tick
    pub fn queue_input(&self, holder: EntityId, input: HolderInput) {
        let _ = self.input_sender.send(QueuedInput { holder, input });
    }

    pub fn queue_interact(&self, holder: EntityId) {
        self.queue_input(holder, HolderInput::Interact);
    }

    /// Takes every presentation event emitted since the last drain
    pub fn drain_frame_events(&mut self) -> Vec<FrameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Splits the instance so a prop and a holder can be mutated alongside the
    /// context the prop needs.
    fn split(
        &mut self,
    ) -> (
        &mut HashMap<EntityId, PrimaryProp>,
        &mut HashMap<EntityId, Holder>,
        PropContext<'_>,
    ) {
        let ctx = PropContext {
            now: self.time,
            physics: &mut self.physics,
            scheduler: &mut self.scheduler,
            rng: &mut self.rng,
            events: &mut self.events,
            minis: &self.minis,
            config: &self.config,
        };
        (&mut self.props, &mut self.holders, ctx)
    }

    /// Trigger input: pulls the highlighted prop when idle, throws the held
    /// prop when holding.
    pub fn interact(&mut self, holder_id: EntityId) -> InteractOutcome {
        let Some(holder) = self.holders.get(&holder_id) else {
            warn!(holder = holder_id, "interact for unknown holder");
            return InteractOutcome::Ignored;
        };

        if holder.is_holding() {
            let viewpoint = holder.viewpoint();
            let mut ignore = vec![holder_id];
            ignore.extend(holder.held());
            let destination =
                targeting::throw_destination(&self.physics, &viewpoint, &ignore, &self.config.targeting);

            let (props, holders, mut ctx) = self.split();
            let Some(holder) = holders.get_mut(&holder_id) else {
                return InteractOutcome::Ignored;
            };
            let Some(prop_id) = holder.release(ctx.config, ctx.events) else {
                return InteractOutcome::Ignored;
            };
            let Some(prop) = props.get_mut(&prop_id) else {
                return InteractOutcome::Ignored;
            };
            prop.push(destination, &mut ctx);
            return InteractOutcome::Pushed {
                prop: prop_id,
                destination,
            };
        }

        let Some(target) = holder.highlighted() else {
            return InteractOutcome::Ignored;
        };
        let (props, holders, mut ctx) = self.split();
        let Some(prop) = props.get_mut(&target) else {
            return InteractOutcome::Ignored;
        };
        if !prop.pull(holder_id, &mut ctx) {
            debug!(prop = target, holder = holder_id, "pull refused, already held");
            return InteractOutcome::Ignored;
        }
        if let Some(holder) = holders.get_mut(&holder_id) {
            holder.begin_hold(target, ctx.config, ctx.events);
        }
        InteractOutcome::Pulled(target)
    }

    /// Look input for a holder
    pub fn look(&mut self, holder: EntityId, yaw: f32) {
        if let Some(h) = self.holders.get_mut(&holder) {
            h.apply_look(yaw);
        }
    }

    /// Movement input for a holder (orientation only)
    pub fn move_holder(&mut self, holder: EntityId, axes: [f32; 2]) {
        if let Some(h) = self.holders.get_mut(&holder) {
            h.apply_movement(Vector2::new(axes[0], axes[1]));
        }
    }

    fn process_input(&mut self, queued: QueuedInput) {
        if !self.holders.contains_key(&queued.holder) {
            warn!(holder = queued.holder, "dropping input for unknown holder");
            return;
        }
        match queued.input {
            HolderInput::Interact => {
                self.interact(queued.holder);
            }
            HolderInput::Look { yaw } => self.look(queued.holder, yaw),
            HolderInput::Move { axes } => self.move_holder(queued.holder, axes),
        }
    }

    /// Advances the world by one fixed timestep
    pub fn tick(&mut self) {
        let dt = self.config.physics.timestep;
        tick_pipeline::run_tick_phases(self, dt);
        self.tick += 1;
    }
}
