//! Physics and telekinesis tuning constants.
//! Config defaults read from here so a value is never duplicated.

/// Physics constants
pub mod physics {
    /// Default gravity in units/s² (centimetre world, matches the tuning below)
    pub const DEFAULT_GRAVITY: f32 = 980.0;

    /// Fixed timestep for physics simulation (60 Hz)
    pub const TIMESTEP: f32 = 1.0 / 60.0;

    /// Holder capsule radius
    pub const HOLDER_RADIUS: f32 = 42.0;

    /// Holder capsule half height (cylinder part)
    pub const HOLDER_HALF_HEIGHT: f32 = 54.0;

    /// Small epsilon for float comparisons
    pub const EPSILON: f32 = 0.001;
}

/// Lift phase defaults
pub mod lift {
    pub const DURATION_SECONDS: f32 = 0.5;
    pub const HEIGHT: f32 = 150.0;
    /// Fraction of the lift at which Reach starts for a smooth handoff
    pub const REACH_TRANSITION_FRACTION: f32 = 0.8;
    pub const TICK_INTERVAL_SECONDS: f64 = 0.016;
    pub const ANGULAR_IMPULSE_MIN_STRENGTH: f32 = 400.0;
    pub const ANGULAR_IMPULSE_MAX_STRENGTH: f32 = 800.0;
}

/// Reach phase defaults
pub mod reach {
    /// Pull homes at constant speed, so the multiplier sets the hold speed
    pub const PULL_SPEED_MULTIPLIER: f32 = 60.0;
    /// Push is distance-proportional, the offset itself carries the speed
    pub const PUSH_SPEED_MULTIPLIER: f32 = 1.0;
    /// Upper bound on the direction vector before mass/speed scaling
    pub const MAX_IMPULSE: f32 = 1000.0;
    pub const MASS_MIN: f32 = 50.0;
    pub const MASS_MAX: f32 = 700.0;
    pub const MASS_MULTIPLIER_MIN: f32 = 1.0;
    pub const MASS_MULTIPLIER_MAX: f32 = 5.0;
    /// Speed in units/s a thrown prop leaves a surface with
    pub const COLLISION_BOUNCINESS: f32 = 300.0;
    pub const HELD_LINEAR_DAMPING: f32 = 20.0;
    pub const RESTING_LINEAR_DAMPING: f32 = 0.1;
    /// Not above the physics step, so Reach runs every tick
    pub const TICK_INTERVAL_SECONDS: f64 = 0.016;
}

/// Jitter defaults, intervals are counted in reach ticks
pub mod jitter {
    pub const FRAME_INTERVAL_MIN: u32 = 10;
    pub const FRAME_INTERVAL_MAX: u32 = 30;
    pub const STRENGTH_MIN: u32 = 100;
    pub const STRENGTH_MAX: u32 = 300;
}

/// Mini prop attraction defaults
pub mod attraction {
    pub const FIELD_RADIUS: f32 = 200.0;
    pub const FORCE: f32 = 1000.0;
    pub const HELD_LINEAR_DAMPING: f32 = 10.0;
    pub const RESTING_LINEAR_DAMPING: f32 = 0.01;
}

/// Holder targeting defaults
pub mod targeting {
    pub const DETECTION_RADIUS: f32 = 25.0;
    pub const DETECTION_DISTANCE: f32 = 5000.0;
    pub const THROW_TRACE_DISTANCE: f32 = 20000.0;
    /// Where held props are drawn to, in the holder's local frame (x right, y up, z forward)
    pub const ANCHOR_OFFSET: [f32; 3] = [60.0, 120.0, 80.0];
}

/// Camera rig targets
pub mod camera {
    pub const DEFAULT_ARM_LENGTH: f32 = 250.0;
    pub const DEFAULT_OFFSET_RIGHT: f32 = 30.0;
    pub const DEFAULT_OFFSET_UP: f32 = 30.0;
    pub const ZOOM_ARM_LENGTH: f32 = 200.0;
    pub const ZOOM_OFFSET_RIGHT: f32 = 60.0;
    pub const ZOOM_OFFSET_UP: f32 = 0.0;
}
