use crossbeam_channel::Receiver;
use nalgebra::{Isometry3, Point3, Vector3};
use rapier3d::parry::query::ShapeCastOptions;
use rapier3d::parry::shape::Ball;
use rapier3d::prelude::*;
use std::collections::{HashMap, HashSet};

use super::constants::physics as consts;

/// Identifier shared by props, mini props, holders and static geometry.
pub type EntityId = u64;

// Collision groups. Mini props toggle their GROUP_PRIMARY_PROP filter bit to
// switch between blocking and ignoring primary props.
const GROUP_STATIC: Group = Group::GROUP_1;
const GROUP_CHARACTER: Group = Group::GROUP_2;
const GROUP_PRIMARY_PROP: Group = Group::GROUP_3;
const GROUP_MINI_PROP: Group = Group::GROUP_4;
const GROUP_ATTRACTION_FIELD: Group = Group::GROUP_5;

/// How a body responds to contacts with primary props.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionResponse {
    Ignore,
    Block,
}

/// Object category used to filter scene queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryCategory {
    PrimaryProp,
    MiniProp,
}

/// Nearest hit of a sphere or ray cast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneHit {
    pub entity: EntityId,
    /// Impact point for rays, sphere center at impact for sphere casts
    pub point: Vector3<f32>,
    pub normal: Vector3<f32>,
    pub distance: f32,
}

/// Physics feedback drained after each step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PhysicsEvent {
    /// `entity` started touching `other`. `normal` is the surface normal of the
    /// touched surface, pointing back toward `entity`.
    Contact {
        entity: EntityId,
        other: Option<EntityId>,
        point: Vector3<f32>,
        normal: Vector3<f32>,
    },
    /// `other` entered the attraction field of `owner`
    FieldEntered { owner: EntityId, other: EntityId },
    /// `other` left the attraction field of `owner`
    FieldExited { owner: EntityId, other: EntityId },
}

/// Body-level directives the telekinesis core issues.
/// Missing entities are silently ignored by every setter.
pub trait BodyPhysics {
    fn position(&self, entity: EntityId) -> Option<Vector3<f32>>;
    fn set_position(&mut self, entity: EntityId, position: Vector3<f32>);
    fn mass(&self, entity: EntityId) -> Option<f32>;
    /// Impulse expressed as a velocity change, independent of mass
    fn apply_velocity_impulse(&mut self, entity: EntityId, delta_v: Vector3<f32>);
    /// Angular velocity change in degrees per second
    fn apply_angular_impulse_degrees(&mut self, entity: EntityId, delta_w: Vector3<f32>);
    /// Velocity change applied at a world-space point, so an off-center
    /// point also adds spin
    fn apply_velocity_impulse_at_point(&mut self, entity: EntityId, delta_v: Vector3<f32>, point: Vector3<f32>);
    /// Acceleration for the current tick, independent of mass
    fn add_acceleration(&mut self, entity: EntityId, acceleration: Vector3<f32>);
    fn set_gravity_enabled(&mut self, entity: EntityId, enabled: bool);
    fn set_linear_damping(&mut self, entity: EntityId, damping: f32);
    fn set_linear_velocity(&mut self, entity: EntityId, velocity: Vector3<f32>);
    fn set_response_to_primary_props(&mut self, entity: EntityId, response: CollisionResponse);
}

/// Scene queries against the physical world. Sensors never produce hits.
pub trait SceneQuery {
    fn sphere_cast(
        &self,
        origin: Vector3<f32>,
        direction: Vector3<f32>,
        radius: f32,
        max_distance: f32,
        category: QueryCategory,
    ) -> Option<SceneHit>;

    fn ray_cast(
        &self,
        origin: Vector3<f32>,
        direction: Vector3<f32>,
        max_distance: f32,
        ignore: &[EntityId],
    ) -> Option<SceneHit>;

    fn overlap_sphere(&self, center: Vector3<f32>, radius: f32, category: QueryCategory) -> Vec<EntityId>;
}

/// Everything the telekinesis core needs from the physics engine.
pub trait PhysicsBackend: BodyPhysics + SceneQuery {}

impl<T: BodyPhysics + SceneQuery> PhysicsBackend for T {}

fn category_groups(category: QueryCategory) -> InteractionGroups {
    let filter = match category {
        QueryCategory::PrimaryProp => GROUP_PRIMARY_PROP,
        QueryCategory::MiniProp => GROUP_MINI_PROP,
    };
    InteractionGroups::new(Group::ALL, filter)
}

fn mini_prop_filter(response: CollisionResponse) -> Group {
    let mut filter = Group::ALL;
    if response == CollisionResponse::Ignore {
        filter.remove(GROUP_PRIMARY_PROP);
    }
    filter
}

/// Wrapper around Rapier3D for the telekinesis sandbox.
/// Entities are addressed by `EntityId`; Rapier handles stay internal.
pub struct PhysicsWorld {
    pub gravity: Vector<Real>,
    pub rigid_body_set: RigidBodySet,
    pub collider_set: ColliderSet,
    pub integration_parameters: IntegrationParameters,
    pub physics_pipeline: PhysicsPipeline,
    pub island_manager: IslandManager,
    pub broad_phase: DefaultBroadPhase,
    pub narrow_phase: NarrowPhase,
    pub impulse_joint_set: ImpulseJointSet,
    pub multibody_joint_set: MultibodyJointSet,
    pub ccd_solver: CCDSolver,
    pub query_pipeline: QueryPipeline,

    /// Maps entity ID to Rapier rigid body handle
    entity_to_body: HashMap<EntityId, RigidBodyHandle>,
    /// Maps solid colliders to their entity (contact reporting and queries)
    collider_to_entity: HashMap<ColliderHandle, EntityId>,
    /// Maps attraction field sensors to the primary prop owning them
    field_to_owner: HashMap<ColliderHandle, EntityId>,
    /// Bodies holding a per-tick acceleration force
    forced_bodies: HashSet<RigidBodyHandle>,
    event_collector: ChannelEventCollector,
    collision_events: Receiver<CollisionEvent>,
    contact_force_events: Receiver<ContactForceEvent>,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld {
    /// Creates a new physics world with default gravity
    pub fn new() -> Self {
        let (collision_send, collision_events) = crossbeam_channel::unbounded();
        let (contact_force_send, contact_force_events) = crossbeam_channel::unbounded();

        Self {
            gravity: vector![0.0, -consts::DEFAULT_GRAVITY, 0.0],
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            integration_parameters: IntegrationParameters::default(),
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            entity_to_body: HashMap::new(),
            collider_to_entity: HashMap::new(),
            field_to_owner: HashMap::new(),
            forced_bodies: HashSet::new(),
            event_collector: ChannelEventCollector::new(collision_send, contact_force_send),
            collision_events,
            contact_force_events,
        }
    }

    /// Sets the downward gravity for the physics world
    pub fn set_gravity(&mut self, gravity_y: f32) {
        self.gravity = vector![0.0, -gravity_y, 0.0];
    }

    /// Steps the physics simulation forward by dt seconds
    pub fn step(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;
        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &self.event_collector,
        );
    }

    /// Refreshes the query pipeline so casts see bodies added or moved since the last step
    pub fn update_queries(&mut self) {
        self.query_pipeline.update(&self.collider_set);
    }

    /// Drops the per-tick acceleration forces added through `add_acceleration`
    pub fn clear_accelerations(&mut self) {
        for handle in self.forced_bodies.drain() {
            if let Some(body) = self.rigid_body_set.get_mut(handle) {
                body.reset_forces(false);
            }
        }
    }

    fn insert_body(&mut self, entity: EntityId, body: RigidBody, collider: Collider) -> RigidBodyHandle {
        let handle = self.rigid_body_set.insert(body);
        let collider_handle = self
            .collider_set
            .insert_with_parent(collider, handle, &mut self.rigid_body_set);
        self.entity_to_body.insert(entity, handle);
        self.collider_to_entity.insert(collider_handle, entity);
        handle
    }

    /// Adds fixed box geometry (floors, walls)
    pub fn add_static_box(&mut self, entity: EntityId, position: Vector3<f32>, half_extents: Vector3<f32>) {
        let body = RigidBodyBuilder::fixed().translation(position).build();
        let collider = ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
            .collision_groups(InteractionGroups::new(GROUP_STATIC, Group::ALL))
            .build();
        self.insert_body(entity, body, collider);
    }

    /// Adds a primary prop: a dynamic box reporting contacts, carrying a
    /// massless sensor ball as its attraction field.
    pub fn add_primary_prop(
        &mut self,
        entity: EntityId,
        position: Vector3<f32>,
        half_extents: Vector3<f32>,
        mass: f32,
        field_radius: f32,
        linear_damping: f32,
    ) {
        let body = RigidBodyBuilder::dynamic()
            .translation(position)
            .linear_damping(linear_damping)
            .ccd_enabled(true)
            .build();
        let collider = ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
            .mass(mass)
            .collision_groups(InteractionGroups::new(GROUP_PRIMARY_PROP, Group::ALL))
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build();
        let handle = self.insert_body(entity, body, collider);

        let field = ColliderBuilder::ball(field_radius)
            .sensor(true)
            .density(0.0)
            .collision_groups(InteractionGroups::new(GROUP_ATTRACTION_FIELD, GROUP_MINI_PROP))
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build();
        let field_handle = self
            .collider_set
            .insert_with_parent(field, handle, &mut self.rigid_body_set);
        self.field_to_owner.insert(field_handle, entity);
    }

    /// Adds a mini prop: a dynamic ball that ignores primary props until recruited
    pub fn add_mini_prop(
        &mut self,
        entity: EntityId,
        position: Vector3<f32>,
        radius: f32,
        mass: f32,
        linear_damping: f32,
    ) {
        let body = RigidBodyBuilder::dynamic()
            .translation(position)
            .linear_damping(linear_damping)
            .build();
        let collider = ColliderBuilder::ball(radius)
            .mass(mass)
            .collision_groups(InteractionGroups::new(
                GROUP_MINI_PROP,
                mini_prop_filter(CollisionResponse::Ignore),
            ))
            .build();
        self.insert_body(entity, body, collider);
    }

    /// Adds a holder body (kinematic capsule moved by the host)
    pub fn add_holder(&mut self, entity: EntityId, position: Vector3<f32>) {
        let body = RigidBodyBuilder::kinematic_position_based()
            .translation(position)
            .build();
        let collider = ColliderBuilder::capsule_y(consts::HOLDER_HALF_HEIGHT, consts::HOLDER_RADIUS)
            .collision_groups(InteractionGroups::new(GROUP_CHARACTER, Group::ALL))
            .build();
        self.insert_body(entity, body, collider);
    }

    /// Moves a kinematic holder body
    pub fn set_holder_position(&mut self, entity: EntityId, position: Vector3<f32>) {
        let Some(body) = self.body_mut(entity) else {
            return;
        };
        if body.is_kinematic() {
            body.set_translation(position, true);
            body.set_next_kinematic_translation(position);
        }
    }

    /// Removes an entity and all its colliders
    pub fn remove(&mut self, entity: EntityId) -> bool {
        let Some(handle) = self.entity_to_body.remove(&entity) else {
            return false;
        };
        if let Some(body) = self.rigid_body_set.get(handle) {
            for ch in body.colliders() {
                self.collider_to_entity.remove(ch);
                self.field_to_owner.remove(ch);
            }
        }
        self.forced_bodies.remove(&handle);
        self.rigid_body_set.remove(
            handle,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );
        true
    }

    /// Checks if an entity has a physics body
    pub fn has_entity(&self, entity: EntityId) -> bool {
        self.entity_to_body.contains_key(&entity)
    }

    /// Whether gravity currently acts on the entity
    pub fn gravity_enabled(&self, entity: EntityId) -> Option<bool> {
        self.body(entity).map(|body| body.gravity_scale() > 0.0)
    }

    /// Current linear velocity of the entity
    pub fn linear_velocity(&self, entity: EntityId) -> Option<Vector3<f32>> {
        self.body(entity).map(|body| *body.linvel())
    }

    /// Current linear damping of the entity
    pub fn linear_damping(&self, entity: EntityId) -> Option<f32> {
        self.body(entity).map(|body| body.linear_damping())
    }

    /// Current response of a body's solid colliders toward primary props
    pub fn response_to_primary_props(&self, entity: EntityId) -> Option<CollisionResponse> {
        let body = self.body(entity)?;
        let collider = body
            .colliders()
            .iter()
            .filter_map(|ch| self.collider_set.get(*ch))
            .find(|c| !c.is_sensor())?;
        if collider.collision_groups().filter.contains(GROUP_PRIMARY_PROP) {
            Some(CollisionResponse::Block)
        } else {
            Some(CollisionResponse::Ignore)
        }
    }

    fn body(&self, entity: EntityId) -> Option<&RigidBody> {
        self.entity_to_body
            .get(&entity)
            .and_then(|&h| self.rigid_body_set.get(h))
    }

    fn body_mut(&mut self, entity: EntityId) -> Option<&mut RigidBody> {
        let handle = *self.entity_to_body.get(&entity)?;
        self.rigid_body_set.get_mut(handle)
    }

    /// Drains contact and attraction field events produced by the last step
    pub fn drain_events(&mut self) -> Vec<PhysicsEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.collision_events.try_recv() {
            match event {
                CollisionEvent::Started(c1, c2, flags) => {
                    if flags.contains(CollisionEventFlags::SENSOR) {
                        self.push_field_event(c1, c2, true, &mut events);
                    } else {
                        self.push_contact_events(c1, c2, &mut events);
                    }
                }
                CollisionEvent::Stopped(c1, c2, flags) => {
                    if flags.contains(CollisionEventFlags::SENSOR) {
                        self.push_field_event(c1, c2, false, &mut events);
                    }
                }
            }
        }
        // Contact forces are not consumed; keep the channel empty.
        while self.contact_force_events.try_recv().is_ok() {}
        events
    }

    fn push_field_event(
        &self,
        c1: ColliderHandle,
        c2: ColliderHandle,
        entered: bool,
        events: &mut Vec<PhysicsEvent>,
    ) {
        let (owner, other) = match (self.field_to_owner.get(&c1), self.field_to_owner.get(&c2)) {
            (Some(&owner), _) => (owner, self.collider_to_entity.get(&c2).copied()),
            (None, Some(&owner)) => (owner, self.collider_to_entity.get(&c1).copied()),
            (None, None) => return,
        };
        let Some(other) = other else {
            return;
        };
        events.push(if entered {
            PhysicsEvent::FieldEntered { owner, other }
        } else {
            PhysicsEvent::FieldExited { owner, other }
        });
    }

    fn push_contact_events(&self, c1: ColliderHandle, c2: ColliderHandle, events: &mut Vec<PhysicsEvent>) {
        let e1 = self.collider_to_entity.get(&c1).copied();
        let e2 = self.collider_to_entity.get(&c2).copied();
        let geometry = self.contact_geometry(c1, c2);

        for (entity, other, sign) in [(e1, e2, -1.0f32), (e2, e1, 1.0f32)] {
            let Some(entity) = entity else {
                continue;
            };
            let (point, normal) = match geometry {
                Some((point, normal_1_to_2)) => (point, normal_1_to_2 * sign),
                None => self.fallback_contact(entity, other),
            };
            events.push(PhysicsEvent::Contact {
                entity,
                other,
                point,
                normal,
            });
        }
    }

    /// Contact point and normal pointing from `c1` toward `c2`
    fn contact_geometry(&self, c1: ColliderHandle, c2: ColliderHandle) -> Option<(Vector3<f32>, Vector3<f32>)> {
        let pair = self.narrow_phase.contact_pair(c1, c2)?;
        let flip = pair.collider1 != c1;
        pair.manifolds.iter().find_map(|manifold| {
            let contact = manifold.data.solver_contacts.first()?;
            let normal = if flip {
                -manifold.data.normal
            } else {
                manifold.data.normal
            };
            Some((contact.point.coords, normal))
        })
    }

    fn fallback_contact(&self, entity: EntityId, other: Option<EntityId>) -> (Vector3<f32>, Vector3<f32>) {
        let point = self.position(entity).unwrap_or_else(Vector3::zeros);
        let normal = other
            .and_then(|o| self.position(o))
            .and_then(|o| (point - o).try_normalize(consts::EPSILON))
            .unwrap_or_else(Vector3::y);
        (point, normal)
    }
}

impl BodyPhysics for PhysicsWorld {
    fn position(&self, entity: EntityId) -> Option<Vector3<f32>> {
        self.body(entity).map(|body| *body.translation())
    }

    fn set_position(&mut self, entity: EntityId, position: Vector3<f32>) {
        if let Some(body) = self.body_mut(entity) {
            body.set_translation(position, true);
        }
    }

    fn mass(&self, entity: EntityId) -> Option<f32> {
        self.body(entity).map(|body| body.mass())
    }

    fn apply_velocity_impulse(&mut self, entity: EntityId, delta_v: Vector3<f32>) {
        if let Some(body) = self.body_mut(entity) {
            if body.is_dynamic() {
                let mass = body.mass();
                body.apply_impulse(delta_v * mass, true);
            }
        }
    }

    fn apply_angular_impulse_degrees(&mut self, entity: EntityId, delta_w: Vector3<f32>) {
        if let Some(body) = self.body_mut(entity) {
            if body.is_dynamic() {
                let angvel = *body.angvel() + delta_w.map(f32::to_radians);
                body.set_angvel(angvel, true);
            }
        }
    }

    fn apply_velocity_impulse_at_point(&mut self, entity: EntityId, delta_v: Vector3<f32>, point: Vector3<f32>) {
        if let Some(body) = self.body_mut(entity) {
            if body.is_dynamic() {
                let mass = body.mass();
                body.apply_impulse_at_point(delta_v * mass, Point3::from(point), true);
            }
        }
    }

    fn add_acceleration(&mut self, entity: EntityId, acceleration: Vector3<f32>) {
        let Some(&handle) = self.entity_to_body.get(&entity) else {
            return;
        };
        if let Some(body) = self.rigid_body_set.get_mut(handle) {
            if body.is_dynamic() {
                let mass = body.mass();
                body.add_force(acceleration * mass, true);
                self.forced_bodies.insert(handle);
            }
        }
    }

    fn set_gravity_enabled(&mut self, entity: EntityId, enabled: bool) {
        if let Some(body) = self.body_mut(entity) {
            body.set_gravity_scale(if enabled { 1.0 } else { 0.0 }, true);
        }
    }

    fn set_linear_damping(&mut self, entity: EntityId, damping: f32) {
        if let Some(body) = self.body_mut(entity) {
            body.set_linear_damping(damping);
        }
    }

    fn set_linear_velocity(&mut self, entity: EntityId, velocity: Vector3<f32>) {
        if let Some(body) = self.body_mut(entity) {
            if body.is_dynamic() {
                body.set_linvel(velocity, true);
            }
        }
    }

    fn set_response_to_primary_props(&mut self, entity: EntityId, response: CollisionResponse) {
        let Some(body) = self.body(entity) else {
            return;
        };
        let colliders: Vec<_> = body.colliders().to_vec();
        for ch in colliders {
            if let Some(collider) = self.collider_set.get_mut(ch) {
                if collider.is_sensor() {
                    continue;
                }
                let mut groups = collider.collision_groups();
                match response {
                    CollisionResponse::Block => groups.filter.insert(GROUP_PRIMARY_PROP),
                    CollisionResponse::Ignore => groups.filter.remove(GROUP_PRIMARY_PROP),
                }
                collider.set_collision_groups(groups);
            }
        }
    }
}

impl SceneQuery for PhysicsWorld {
    fn sphere_cast(
        &self,
        origin: Vector3<f32>,
        direction: Vector3<f32>,
        radius: f32,
        max_distance: f32,
        category: QueryCategory,
    ) -> Option<SceneHit> {
        let direction = direction.try_normalize(consts::EPSILON)?;
        let shape = Ball::new(radius);
        let shape_pos = Isometry3::translation(origin.x, origin.y, origin.z);
        let filter = QueryFilter::default()
            .exclude_sensors()
            .groups(category_groups(category));

        let (collider, hit) = self.query_pipeline.cast_shape(
            &self.rigid_body_set,
            &self.collider_set,
            &shape_pos,
            &direction,
            &shape,
            ShapeCastOptions::with_max_time_of_impact(max_distance),
            filter,
        )?;
        let entity = *self.collider_to_entity.get(&collider)?;
        Some(SceneHit {
            entity,
            point: origin + direction * hit.time_of_impact,
            normal: -direction,
            distance: hit.time_of_impact,
        })
    }

    fn ray_cast(
        &self,
        origin: Vector3<f32>,
        direction: Vector3<f32>,
        max_distance: f32,
        ignore: &[EntityId],
    ) -> Option<SceneHit> {
        let direction = direction.try_normalize(consts::EPSILON)?;
        let ignored: Vec<RigidBodyHandle> = ignore
            .iter()
            .filter_map(|e| self.entity_to_body.get(e).copied())
            .collect();
        let predicate = |_: ColliderHandle, collider: &Collider| {
            collider.parent().map_or(true, |parent| !ignored.contains(&parent))
        };
        let filter = QueryFilter::default().exclude_sensors().predicate(&predicate);
        let ray = Ray::new(Point3::from(origin), direction);

        let (collider, hit) = self.query_pipeline.cast_ray_and_get_normal(
            &self.rigid_body_set,
            &self.collider_set,
            &ray,
            max_distance,
            true, // solid
            filter,
        )?;
        let entity = *self.collider_to_entity.get(&collider)?;
        Some(SceneHit {
            entity,
            point: ray.point_at(hit.time_of_impact).coords,
            normal: hit.normal,
            distance: hit.time_of_impact,
        })
    }

    fn overlap_sphere(&self, center: Vector3<f32>, radius: f32, category: QueryCategory) -> Vec<EntityId> {
        let mut found = Vec::new();
        let shape = Ball::new(radius);
        let shape_pos = Isometry3::translation(center.x, center.y, center.z);
        let filter = QueryFilter::default()
            .exclude_sensors()
            .groups(category_groups(category));

        self.query_pipeline.intersections_with_shape(
            &self.rigid_body_set,
            &self.collider_set,
            &shape_pos,
            &shape,
            filter,
            |collider| {
                if let Some(&entity) = self.collider_to_entity.get(&collider) {
                    if !found.contains(&entity) {
                        found.push(entity);
                    }
                }
                true // continue searching
            },
        );
        found.sort_unstable();
        found
    }
}
