use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, trace};

use super::attraction::AttractionSet;
use super::constants::physics::EPSILON;
use super::frame_event::{FrameEvent, SoundKind};
use super::mini_prop::MiniPropRegistry;
use super::physics::{BodyPhysics, EntityId, PhysicsBackend, QueryCategory};
use super::scheduler::{PhaseKind, PhaseScheduler, TimerId};
use crate::config::{ReachConfig, ReachMode, TelekinesisConfig};

/// Interaction phase of a primary prop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropState {
    /// At rest, no active timers
    Idle,
    /// Being lifted or held in front of the holder
    Lifted,
    /// Thrown, until the first contact resolves it
    Pushed,
}

/// Where the Reach phase homes to
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReachTarget {
    /// The holder's anchor point, re-read every tick
    HolderAnchor,
    /// A fixed world point (throw destination)
    Point(Vector3<f32>),
}

/// Active phase timers. Each purpose has at most one timer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTimers {
    pub lift: Option<TimerId>,
    pub reach: Option<TimerId>,
}

/// Everything a prop phase needs from the world for one call.
pub struct PropContext<'a> {
    pub now: f64,
    pub physics: &'a mut dyn PhysicsBackend,
    pub scheduler: &'a mut PhaseScheduler,
    pub rng: &'a mut StdRng,
    pub events: &'a mut Vec<FrameEvent>,
    pub minis: &'a MiniPropRegistry,
    pub config: &'a TelekinesisConfig,
}

/// Capability of anything a holder can target.
pub trait Interactable {
    fn set_highlighted(&mut self, highlighted: bool, events: &mut Vec<FrameEvent>);
    /// Starts lifting toward `holder`. Returns false if another holder already holds it.
    fn pull(&mut self, holder: EntityId, ctx: &mut PropContext<'_>) -> bool;
    /// Throws toward `destination`
    fn push(&mut self, destination: Vector3<f32>, ctx: &mut PropContext<'_>);
}

/// Turns the offset toward a reach target into a velocity impulse.
///
/// Constant-speed mode drops the distance, both modes cap the vector at
/// `max_impulse` before the mass and speed multipliers apply.
pub fn reach_impulse(
    offset: Vector3<f32>,
    mode: ReachMode,
    speed_multiplier: f32,
    mass: f32,
    config: &ReachConfig,
) -> Vector3<f32> {
    let direction = match mode {
        ReachMode::ConstantSpeed => offset.try_normalize(EPSILON).unwrap_or_else(Vector3::zeros),
        ReachMode::DistanceProportional => offset,
    };
    let direction = direction.cap_magnitude(config.max_impulse);
    direction * config.mass_multiplier(mass) * speed_multiplier
}

/// Mirror `direction` about the plane with normal `normal`
pub fn reflect(direction: Vector3<f32>, normal: Vector3<f32>) -> Vector3<f32> {
    let n = normal.try_normalize(EPSILON).unwrap_or_else(Vector3::zeros);
    direction - n * (2.0 * direction.dot(&n))
}

/// Uniformly distributed unit vector
pub fn random_unit_vector(rng: &mut StdRng) -> Vector3<f32> {
    let z: f32 = rng.gen_range(-1.0..=1.0);
    let theta: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
    let r = (1.0 - z * z).max(0.0).sqrt();
    Vector3::new(r * theta.cos(), r * theta.sin(), z)
}

fn ordered<T: PartialOrd>(a: T, b: T) -> (T, T) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// A prop the holder can lift, hold and throw.
#[derive(Debug, Clone)]
pub struct PrimaryProp {
    id: EntityId,
    state: PropState,
    highlighted: bool,
    lift_start: Vector3<f32>,
    lift_start_time: f64,
    reach_target: ReachTarget,
    push_direction: Vector3<f32>,
    jitter_counter: u32,
    jitter_interval: u32,
    holder: Option<EntityId>,
    attracted: AttractionSet,
    timers: PhaseTimers,
}

impl PrimaryProp {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            state: PropState::Idle,
            highlighted: false,
            lift_start: Vector3::zeros(),
            lift_start_time: 0.0,
            reach_target: ReachTarget::HolderAnchor,
            push_direction: Vector3::zeros(),
            jitter_counter: 0,
            jitter_interval: 0,
            holder: None,
            attracted: AttractionSet::new(),
            timers: PhaseTimers::default(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn state(&self) -> PropState {
        self.state
    }

    pub fn is_highlighted(&self) -> bool {
        self.highlighted
    }

    /// Holder currently holding this prop, cleared by a push
    pub fn holder(&self) -> Option<EntityId> {
        self.holder
    }

    pub fn is_held(&self) -> bool {
        self.holder.is_some()
    }

    pub fn reach_target(&self) -> ReachTarget {
        self.reach_target
    }

    pub fn push_direction(&self) -> Vector3<f32> {
        self.push_direction
    }

    pub fn lift_start(&self) -> Vector3<f32> {
        self.lift_start
    }

    pub fn attracted(&self) -> &AttractionSet {
        &self.attracted
    }

    pub fn timers(&self) -> PhaseTimers {
        self.timers
    }

    pub fn jitter_interval(&self) -> u32 {
        self.jitter_interval
    }

    /// Lift progress in [0, 1] at `now`
    pub fn lift_alpha(&self, now: f64, duration_seconds: f32) -> f32 {
        if duration_seconds <= 0.0 {
            return 1.0;
        }
        (((now - self.lift_start_time) / duration_seconds as f64) as f32).clamp(0.0, 1.0)
    }

    fn lift_end_time(&self, duration_seconds: f32) -> f64 {
        self.lift_start_time + duration_seconds as f64
    }

    fn start_lift(&mut self, ctx: &mut PropContext<'_>) {
        self.set_highlighted(false, ctx.events);
        let Some(position) = ctx.physics.position(self.id) else {
            return;
        };
        self.lift_start = position;
        self.lift_start_time = ctx.now;
        if let Some(old) = self.timers.lift.take() {
            ctx.scheduler.clear_timer(old);
        }
        self.timers.lift = Some(ctx.scheduler.set_timer(
            self.id,
            PhaseKind::Lift,
            ctx.config.lift.tick_interval_seconds,
            ctx.now,
        ));
        ctx.events.push(FrameEvent::LiftStarted { prop: self.id });
        self.detect_mini_props(ctx);
        ctx.events.push(FrameEvent::PlaySound {
            prop: self.id,
            kind: SoundKind::Lift,
        });
        debug!(prop = self.id, start = ?position, "lift started");
    }

    /// Lift timer callback: eases the prop up to the hold height.
    pub fn lift_tick(&mut self, ctx: &mut PropContext<'_>) {
        self.state = PropState::Lifted;
        let Some(position) = ctx.physics.position(self.id) else {
            return;
        };

        let config = ctx.config;
        let lift = &config.lift;
        let alpha = self.lift_alpha(ctx.now, lift.duration_seconds);
        let start_height = self.lift_start.y;
        let target_height = start_height + lift.height;

        // Reach overlaps the tail of the lift
        if alpha >= lift.reach_transition_fraction && self.timers.reach.is_none() {
            self.start_reach(ReachTarget::HolderAnchor, ctx);
        }

        if ctx.now >= self.lift_end_time(lift.duration_seconds) {
            ctx.physics
                .set_position(self.id, Vector3::new(position.x, target_height, position.z));
            if let Some(timer) = self.timers.lift.take() {
                ctx.scheduler.clear_timer(timer);
            }
            debug!(prop = self.id, height = target_height, "lift finished");
        } else {
            let height = start_height + (target_height - start_height) * alpha;
            ctx.physics
                .set_position(self.id, Vector3::new(position.x, height, position.z));
            trace!(prop = self.id, alpha, height, "lift tick");
        }
    }

    fn start_reach(&mut self, target: ReachTarget, ctx: &mut PropContext<'_>) {
        let config = ctx.config;
        self.reach_target = target;
        ctx.physics.set_gravity_enabled(self.id, false);
        ctx.physics
            .set_linear_damping(self.id, config.reach.held_linear_damping);

        let jitter = &config.jitter;
        let (lo, hi) = ordered(jitter.frame_interval_min, jitter.frame_interval_max);
        self.jitter_interval = ctx.rng.gen_range(lo..=hi);
        self.jitter_counter = 0;

        // One-time random spin
        let lift = &config.lift;
        let (lo, hi) = ordered(lift.angular_impulse_min_strength, lift.angular_impulse_max_strength);
        let strength = ctx.rng.gen_range(lo..=hi);
        let spin = random_unit_vector(ctx.rng) * strength;
        ctx.physics.apply_angular_impulse_degrees(self.id, spin);

        ctx.events.push(FrameEvent::HoldAudio {
            prop: self.id,
            active: target == ReachTarget::HolderAnchor,
        });
        self.timers.reach = Some(ctx.scheduler.set_timer(
            self.id,
            PhaseKind::Reach,
            config.reach.tick_interval_seconds,
            ctx.now,
        ));
        debug!(prop = self.id, target = ?target, "reach started");
    }

    /// Reach timer callback. `target` is the resolved target point, `None`
    /// when the holder no longer exists (no force is applied then).
    pub fn reach_tick(&mut self, target: Option<Vector3<f32>>, ctx: &mut PropContext<'_>) {
        let Some(target) = target else {
            return;
        };
        let Some(position) = ctx.physics.position(self.id) else {
            return;
        };
        let config = ctx.config;
        let reach = &config.reach;
        ctx.physics.set_gravity_enabled(self.id, false);
        ctx.physics.set_linear_damping(self.id, reach.held_linear_damping);
        ctx.events.push(FrameEvent::FeedLocation {
            prop: self.id,
            location: position,
        });

        let (mode, speed) = match self.reach_target {
            ReachTarget::HolderAnchor => (reach.pull_mode, reach.pull_speed_multiplier),
            ReachTarget::Point(_) => (reach.push_mode, reach.push_speed_multiplier),
        };
        let mass = ctx.physics.mass(self.id).unwrap_or(reach.mass_max);
        let impulse = reach_impulse(target - position, mode, speed, mass, reach);
        ctx.physics.apply_velocity_impulse(self.id, impulse);
        trace!(prop = self.id, impulse = ?impulse, "reach tick");

        if self.state == PropState::Lifted {
            self.jitter(ctx);
            self.attracted.attract(position, &mut *ctx.physics, ctx.minis);
        }
    }

    fn jitter(&mut self, ctx: &mut PropContext<'_>) {
        self.jitter_counter += 1;
        if self.jitter_counter < self.jitter_interval {
            return;
        }
        let config = ctx.config;
        let jitter = &config.jitter;
        self.jitter_counter = 0;
        let (lo, hi) = ordered(jitter.frame_interval_min, jitter.frame_interval_max);
        self.jitter_interval = ctx.rng.gen_range(lo..=hi);
        let (lo, hi) = ordered(jitter.strength_min, jitter.strength_max);
        let strength = ctx.rng.gen_range(lo..=hi) as f32;
        let impulse = random_unit_vector(ctx.rng) * strength;
        ctx.physics.apply_velocity_impulse(self.id, impulse);
        trace!(prop = self.id, strength, "jitter");
    }

    /// Contact callback. Only a thrown prop reacts: it bounces off the surface
    /// in a controlled way and comes to rest. Returns true if handled.
    pub fn handle_contact(&mut self, point: Vector3<f32>, normal: Vector3<f32>, ctx: &mut PropContext<'_>) -> bool {
        if self.state != PropState::Pushed {
            return false;
        }
        let config = ctx.config;
        let reach = &config.reach;
        ctx.events.push(FrameEvent::ParticlesDeactivated { prop: self.id });
        ctx.physics.set_gravity_enabled(self.id, true);
        ctx.physics.set_linear_damping(self.id, reach.resting_linear_damping);
        self.state = PropState::Idle;
        if let Some(timer) = self.timers.reach.take() {
            ctx.scheduler.clear_timer(timer);
        }

        let reflection = reflect(self.push_direction, normal);
        ctx.physics.set_linear_velocity(self.id, Vector3::zeros());
        ctx.physics
            .apply_velocity_impulse_at_point(self.id, reflection * reach.collision_bounciness, point);
        ctx.events.push(FrameEvent::PushCollision {
            prop: self.id,
            point,
            direction: -self.push_direction,
        });
        debug!(prop = self.id, reflection = ?reflection, "throw resolved");
        true
    }

    /// Attraction field overlap began
    pub fn on_field_entered(&mut self, mini: EntityId, ctx: &mut PropContext<'_>) -> bool {
        if !self.is_held() || !ctx.minis.contains_key(&mini) {
            return false;
        }
        self.attracted
            .recruit(mini, &mut *ctx.physics, &ctx.config.attraction)
    }

    /// Attraction field overlap ended
    pub fn on_field_exited(&mut self, mini: EntityId, ctx: &mut PropContext<'_>) -> bool {
        self.attracted
            .dismiss(mini, &mut *ctx.physics, &ctx.config.attraction)
    }

    /// Lets every attracted mini prop go, used when this prop is despawned
    pub fn release_attracted<P: BodyPhysics + ?Sized>(
        &mut self,
        physics: &mut P,
        config: &TelekinesisConfig,
    ) -> Vec<EntityId> {
        self.attracted.release_all(physics, &config.attraction)
    }

    /// Drops a despawned mini prop from the attracted set
    pub fn forget_mini(&mut self, mini: EntityId) -> bool {
        self.attracted.forget(mini)
    }

    /// Forgets a holder that no longer exists
    pub fn forget_holder(&mut self, holder: EntityId) {
        if self.holder == Some(holder) {
            self.holder = None;
        }
    }

    /// Recruits mini props already inside the field when the lift begins
    fn detect_mini_props(&mut self, ctx: &mut PropContext<'_>) {
        let Some(center) = ctx.physics.position(self.id) else {
            return;
        };
        let found = ctx.physics.overlap_sphere(
            center,
            ctx.config.attraction.field_radius,
            QueryCategory::MiniProp,
        );
        for mini in found {
            if ctx.minis.contains_key(&mini) {
                self.attracted
                    .recruit(mini, &mut *ctx.physics, &ctx.config.attraction);
            }
        }
    }
}

impl Interactable for PrimaryProp {
    fn set_highlighted(&mut self, highlighted: bool, events: &mut Vec<FrameEvent>) {
        if self.highlighted == highlighted {
            return;
        }
        self.highlighted = highlighted;
        events.push(FrameEvent::HighlightChanged {
            prop: self.id,
            highlighted,
        });
    }

    fn pull(&mut self, holder: EntityId, ctx: &mut PropContext<'_>) -> bool {
        if self.holder.is_some() {
            return false;
        }
        // Caught mid-flight: the throw no longer applies
        if self.state == PropState::Pushed {
            self.state = PropState::Idle;
        }
        if let Some(timer) = self.timers.reach.take() {
            ctx.scheduler.clear_timer(timer);
        }
        self.holder = Some(holder);
        debug!(prop = self.id, holder, "pulled");
        self.start_lift(ctx);
        true
    }

    fn push(&mut self, destination: Vector3<f32>, ctx: &mut PropContext<'_>) {
        self.state = PropState::Pushed;
        let position = ctx.physics.position(self.id).unwrap_or(destination);
        self.push_direction = (destination - position)
            .try_normalize(EPSILON)
            .unwrap_or_else(Vector3::zeros);
        self.holder = None;

        self.attracted
            .release_all(&mut *ctx.physics, &ctx.config.attraction);

        if let Some(timer) = self.timers.lift.take() {
            ctx.scheduler.clear_timer(timer);
        }
        if let Some(timer) = self.timers.reach.take() {
            ctx.scheduler.clear_timer(timer);
        }
        self.start_reach(ReachTarget::Point(destination), ctx);
        ctx.events.push(FrameEvent::PlaySound {
            prop: self.id,
            kind: SoundKind::Push,
        });
        debug!(prop = self.id, destination = ?destination, "pushed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::mini_prop::MiniProp;
    use crate::game::physics::CollisionResponse;
    use crate::game::testing::{PhysicsCall, RecordingPhysics};
    use rand::SeedableRng;

    const PROP: EntityId = 10;
    const HOLDER: EntityId = 1;

    struct Harness {
        physics: RecordingPhysics,
        scheduler: PhaseScheduler,
        rng: StdRng,
        events: Vec<FrameEvent>,
        minis: MiniPropRegistry,
        config: TelekinesisConfig,
    }

    impl Harness {
        fn new() -> Self {
            let mut physics = RecordingPhysics::new();
            physics.add_body(PROP, Vector3::new(100.0, 20.0, -40.0), 200.0);
            Self {
                physics,
                scheduler: PhaseScheduler::new(),
                rng: StdRng::seed_from_u64(7),
                events: Vec::new(),
                minis: MiniPropRegistry::new(),
                config: TelekinesisConfig::default(),
            }
        }

        fn ctx(&mut self, now: f64) -> PropContext<'_> {
            PropContext {
                now,
                physics: &mut self.physics,
                scheduler: &mut self.scheduler,
                rng: &mut self.rng,
                events: &mut self.events,
                minis: &self.minis,
                config: &self.config,
            }
        }

        fn add_mini(&mut self, id: EntityId) {
            self.physics.add_body(id, Vector3::new(120.0, 20.0, -40.0), 2.0);
            self.minis.insert(id, MiniProp::new(id, 1000.0));
        }
    }

    fn approx(a: Vector3<f32>, b: Vector3<f32>) -> bool {
        (a - b).norm() < 1e-3
    }

    #[test]
    fn test_lift_height_follows_lerp_then_snaps() {
        let mut h = Harness::new();
        let mut prop = PrimaryProp::new(PROP);
        assert!(prop.pull(HOLDER, &mut h.ctx(0.0)));
        assert!(prop.timers().lift.is_some());

        for (t, expected) in [(0.0, 20.0), (0.1, 50.0), (0.25, 95.0), (0.35, 125.0)] {
            prop.lift_tick(&mut h.ctx(t));
            let pos = h.physics.body(PROP).position;
            assert!((pos.y - expected).abs() < 1e-3, "t={t}: {} != {expected}", pos.y);
            assert_eq!(pos.x, 100.0);
            assert_eq!(prop.state(), PropState::Lifted);
        }
        assert!(prop.timers().reach.is_none());

        prop.lift_tick(&mut h.ctx(0.5));
        assert_eq!(h.physics.body(PROP).position.y, 170.0);
        assert!(prop.timers().lift.is_none());
        assert_eq!(h.scheduler.count_for(PROP, PhaseKind::Lift), 0);
    }

    #[test]
    fn test_reach_starts_at_transition_fraction() {
        let mut h = Harness::new();
        let mut prop = PrimaryProp::new(PROP);
        prop.pull(HOLDER, &mut h.ctx(0.0));

        prop.lift_tick(&mut h.ctx(0.39));
        assert!(prop.timers().reach.is_none());

        prop.lift_tick(&mut h.ctx(0.4));
        assert!(prop.timers().reach.is_some());
        assert!(prop.timers().lift.is_some());
        assert_eq!(prop.reach_target(), ReachTarget::HolderAnchor);
        assert!(!h.physics.body(PROP).gravity);
        assert_eq!(h.physics.body(PROP).angular_impulses.len(), 1);

        // Lift keeps going and does not start a second reach
        prop.lift_tick(&mut h.ctx(0.45));
        assert_eq!(h.scheduler.count_for(PROP, PhaseKind::Reach), 1);
        assert!(h.events.contains(&FrameEvent::HoldAudio { prop: PROP, active: true }));
    }

    #[test]
    fn test_pull_emits_hooks_and_clears_highlight() {
        let mut h = Harness::new();
        let mut prop = PrimaryProp::new(PROP);
        prop.set_highlighted(true, &mut h.events);
        prop.pull(HOLDER, &mut h.ctx(0.0));

        assert!(!prop.is_highlighted());
        assert_eq!(prop.holder(), Some(HOLDER));
        assert_eq!(
            h.events,
            vec![
                FrameEvent::HighlightChanged { prop: PROP, highlighted: true },
                FrameEvent::HighlightChanged { prop: PROP, highlighted: false },
                FrameEvent::LiftStarted { prop: PROP },
                FrameEvent::PlaySound { prop: PROP, kind: SoundKind::Lift },
            ]
        );
    }

    #[test]
    fn test_pull_refused_while_held() {
        let mut h = Harness::new();
        let mut prop = PrimaryProp::new(PROP);
        assert!(prop.pull(HOLDER, &mut h.ctx(0.0)));
        assert!(!prop.pull(2, &mut h.ctx(0.1)));
        assert_eq!(prop.holder(), Some(HOLDER));
        assert_eq!(h.scheduler.count_for(PROP, PhaseKind::Lift), 1);
    }

    #[test]
    fn test_pulled_reach_is_distance_independent() {
        let mut h = Harness::new();
        let mut prop = PrimaryProp::new(PROP);
        prop.pull(HOLDER, &mut h.ctx(0.0));
        prop.lift_tick(&mut h.ctx(0.4));
        let base = h.physics.body(PROP).impulses.len();

        let position = h.physics.body(PROP).position;
        prop.reach_tick(Some(position + Vector3::new(0.0, 0.0, 10.0)), &mut h.ctx(0.42));
        prop.reach_tick(Some(position + Vector3::new(0.0, 0.0, 4000.0)), &mut h.ctx(0.44));

        let impulses = &h.physics.body(PROP).impulses[base..];
        // mass 200 maps to 5 - 4 * (150 / 650)
        let expected = (5.0 - 4.0 * (150.0 / 650.0)) * 60.0;
        assert!(approx(impulses[0], Vector3::new(0.0, 0.0, expected)));
        assert!(approx(impulses[1], Vector3::new(0.0, 0.0, expected)));
    }

    #[test]
    fn test_pushed_reach_is_proportional_then_capped() {
        let mut h = Harness::new();
        h.config.reach.push_speed_multiplier = 2.0;
        let mut prop = PrimaryProp::new(PROP);
        let start = h.physics.body(PROP).position;
        prop.push(start + Vector3::new(300.0, 0.0, 0.0), &mut h.ctx(0.0));
        let multiplier = h.config.reach.mass_multiplier(200.0) * 2.0;

        prop.reach_tick(Some(start + Vector3::new(300.0, 0.0, 0.0)), &mut h.ctx(0.02));
        prop.reach_tick(Some(start + Vector3::new(600.0, 0.0, 0.0)), &mut h.ctx(0.04));
        prop.reach_tick(Some(start + Vector3::new(5000.0, 0.0, 0.0)), &mut h.ctx(0.06));

        let impulses = &h.physics.body(PROP).impulses;
        assert!(approx(impulses[0], Vector3::new(300.0 * multiplier, 0.0, 0.0)));
        assert!(approx(impulses[1], Vector3::new(600.0 * multiplier, 0.0, 0.0)));
        assert!(approx(impulses[2], Vector3::new(1000.0 * multiplier, 0.0, 0.0)));
    }

    #[test]
    fn test_reach_without_holder_is_noop() {
        let mut h = Harness::new();
        let mut prop = PrimaryProp::new(PROP);
        prop.pull(HOLDER, &mut h.ctx(0.0));
        prop.lift_tick(&mut h.ctx(0.4));
        let before = h.physics.body(PROP).impulses.len();
        prop.reach_tick(None, &mut h.ctx(0.42));
        assert_eq!(h.physics.body(PROP).impulses.len(), before);
    }

    #[test]
    fn test_jitter_fires_after_interval() {
        let mut h = Harness::new();
        h.config.jitter.frame_interval_min = 3;
        h.config.jitter.frame_interval_max = 3;
        h.config.jitter.strength_min = 100;
        h.config.jitter.strength_max = 100;
        let mut prop = PrimaryProp::new(PROP);
        prop.pull(HOLDER, &mut h.ctx(0.0));
        prop.lift_tick(&mut h.ctx(0.4));
        assert_eq!(prop.jitter_interval(), 3);

        let anchor = Vector3::new(0.0, 200.0, 0.0);
        for tick in 0..2 {
            prop.reach_tick(Some(anchor), &mut h.ctx(0.42 + tick as f64 * 0.02));
        }
        assert_eq!(h.physics.body(PROP).impulses.len(), 2);

        prop.reach_tick(Some(anchor), &mut h.ctx(0.48));
        let impulses = &h.physics.body(PROP).impulses;
        assert_eq!(impulses.len(), 4);
        assert!((impulses[3].norm() - 100.0).abs() < 1e-2);
    }

    #[test]
    fn test_no_jitter_once_pushed() {
        let mut h = Harness::new();
        h.config.jitter.frame_interval_min = 1;
        h.config.jitter.frame_interval_max = 1;
        let mut prop = PrimaryProp::new(PROP);
        let dest = Vector3::new(0.0, 0.0, 900.0);
        prop.push(dest, &mut h.ctx(0.0));
        for tick in 0..5 {
            prop.reach_tick(Some(dest), &mut h.ctx(0.02 * (tick + 1) as f64));
        }
        assert_eq!(h.physics.body(PROP).impulses.len(), 5);
    }

    #[test]
    fn test_push_cancels_lift_and_restarts_reach() {
        let mut h = Harness::new();
        let mut prop = PrimaryProp::new(PROP);
        prop.pull(HOLDER, &mut h.ctx(0.0));
        prop.lift_tick(&mut h.ctx(0.4));
        let first_reach = prop.timers().reach.unwrap();

        let dest = Vector3::new(100.0, 20.0, 2000.0);
        prop.push(dest, &mut h.ctx(0.45));
        assert_eq!(prop.state(), PropState::Pushed);
        assert!(prop.timers().lift.is_none());
        assert!(!h.scheduler.is_active(first_reach));
        assert_eq!(h.scheduler.count_for(PROP, PhaseKind::Reach), 1);
        assert_eq!(prop.reach_target(), ReachTarget::Point(dest));
        assert_eq!(prop.holder(), None);
        assert!(h.events.contains(&FrameEvent::PlaySound { prop: PROP, kind: SoundKind::Push }));
        assert!(h.events.contains(&FrameEvent::HoldAudio { prop: PROP, active: false }));

        let second_reach = prop.timers().reach.unwrap();
        let position = h.physics.body(PROP).position;
        prop.push(position + Vector3::new(-500.0, 0.0, 0.0), &mut h.ctx(0.5));
        assert!(!h.scheduler.is_active(second_reach));
        assert_eq!(h.scheduler.count_for(PROP, PhaseKind::Reach), 1);
        assert!(approx(prop.push_direction(), Vector3::new(-1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_collision_ignored_unless_pushed() {
        let mut h = Harness::new();
        let mut prop = PrimaryProp::new(PROP);
        assert!(!prop.handle_contact(Vector3::zeros(), Vector3::y(), &mut h.ctx(0.0)));

        prop.pull(HOLDER, &mut h.ctx(0.0));
        prop.lift_tick(&mut h.ctx(0.1));
        let calls_before = h.physics.calls.len();
        assert!(!prop.handle_contact(Vector3::zeros(), Vector3::y(), &mut h.ctx(0.1)));
        assert_eq!(prop.state(), PropState::Lifted);
        assert_eq!(h.physics.calls.len(), calls_before);
        assert!(h.physics.body(PROP).point_impulses.is_empty());
    }

    #[test]
    fn test_collision_bounces_with_reflection() {
        let mut h = Harness::new();
        let mut prop = PrimaryProp::new(PROP);
        let start = h.physics.body(PROP).position;
        prop.push(start + Vector3::new(100.0, -100.0, 0.0), &mut h.ctx(0.0));
        prop.reach_tick(Some(start + Vector3::new(100.0, -100.0, 0.0)), &mut h.ctx(0.02));
        h.physics.calls.clear();

        let point = Vector3::new(150.0, 0.0, -40.0);
        assert!(prop.handle_contact(point, Vector3::y(), &mut h.ctx(0.05)));

        assert_eq!(prop.state(), PropState::Idle);
        assert!(prop.timers().reach.is_none());
        assert_eq!(h.scheduler.active_count(), 0);
        let body = h.physics.body(PROP);
        assert!(body.gravity);
        assert_eq!(body.damping, 0.1);

        let d = std::f32::consts::FRAC_1_SQRT_2;
        let expected = Vector3::new(d, d, 0.0) * h.config.reach.collision_bounciness;
        let tail: Vec<_> = h.physics.calls.iter().rev().take(2).cloned().collect();
        match (&tail[1], &tail[0]) {
            (PhysicsCall::SetVelocity(PROP, v), PhysicsCall::VelocityImpulseAtPoint(PROP, delta_v, at)) => {
                assert_eq!(*v, Vector3::zeros());
                assert!(approx(*delta_v, expected));
                assert_eq!(*at, point);
            }
            other => panic!("unexpected call order: {other:?}"),
        }
        assert!(h.events.iter().any(|e| matches!(
            e,
            FrameEvent::PushCollision { prop: PROP, point: p, direction }
                if *p == point && approx(*direction, Vector3::new(-d, d, 0.0))
        )));
        assert!(h.events.contains(&FrameEvent::ParticlesDeactivated { prop: PROP }));

        // A second contact after resolving does nothing
        assert!(!prop.handle_contact(point, Vector3::y(), &mut h.ctx(0.06)));
    }

    #[test]
    fn test_mini_props_follow_held_prop_and_release_on_push() {
        let mut h = Harness::new();
        h.add_mini(20);
        h.add_mini(21);
        h.physics.overlaps = vec![20];
        let mut prop = PrimaryProp::new(PROP);

        prop.pull(HOLDER, &mut h.ctx(0.0));
        assert_eq!(prop.attracted().members(), &[20]);

        assert!(prop.on_field_entered(21, &mut h.ctx(0.1)));
        assert!(!prop.on_field_entered(21, &mut h.ctx(0.1)));
        assert!(!h.physics.body(21).gravity);
        assert_eq!(h.physics.body(21).response, CollisionResponse::Block);

        prop.lift_tick(&mut h.ctx(0.4));
        let anchor = Vector3::new(0.0, 300.0, 0.0);
        prop.reach_tick(Some(anchor), &mut h.ctx(0.42));
        let center = h.physics.body(PROP).position;
        let toward = (center - h.physics.body(20).position).normalize() * 1000.0;
        let pull = h.physics.body(20).accelerations[0];
        assert!(approx(pull, toward));

        prop.push(Vector3::new(0.0, 0.0, 5000.0), &mut h.ctx(0.5));
        assert!(prop.attracted().is_empty());
        for mini in [20, 21] {
            let body = h.physics.body(mini);
            assert!(body.gravity);
            assert_eq!(body.response, CollisionResponse::Ignore);
        }

        // Thrown props do not recruit
        assert!(!prop.on_field_entered(21, &mut h.ctx(0.55)));
        assert!(!prop.on_field_exited(21, &mut h.ctx(0.6)));
    }

    #[test]
    fn test_field_ignored_while_idle_or_unknown() {
        let mut h = Harness::new();
        h.add_mini(20);
        h.physics.add_body(30, Vector3::zeros(), 50.0);
        let mut prop = PrimaryProp::new(PROP);
        assert!(!prop.on_field_entered(20, &mut h.ctx(0.0)));

        prop.pull(HOLDER, &mut h.ctx(0.0));
        assert!(!prop.on_field_entered(30, &mut h.ctx(0.1)));
        assert!(prop.attracted().is_empty());
    }

    #[test]
    fn test_recapture_mid_flight() {
        let mut h = Harness::new();
        let mut prop = PrimaryProp::new(PROP);
        prop.push(Vector3::new(0.0, 0.0, 5000.0), &mut h.ctx(0.0));
        assert_eq!(h.scheduler.count_for(PROP, PhaseKind::Reach), 1);

        assert!(prop.pull(HOLDER, &mut h.ctx(0.2)));
        assert_eq!(prop.state(), PropState::Idle);
        assert_eq!(h.scheduler.count_for(PROP, PhaseKind::Reach), 0);
        assert_eq!(h.scheduler.count_for(PROP, PhaseKind::Lift), 1);
        assert!(!prop.handle_contact(Vector3::zeros(), Vector3::y(), &mut h.ctx(0.21)));
    }

    #[test]
    fn test_reflect_and_random_unit_vector() {
        let r = reflect(Vector3::new(1.0, -1.0, 0.0), Vector3::new(0.0, 3.0, 0.0));
        assert!(approx(r, Vector3::new(1.0, 1.0, 0.0)));

        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..100 {
            assert!((random_unit_vector(&mut rng).norm() - 1.0).abs() < 1e-4);
        }
    }
}
