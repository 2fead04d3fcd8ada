//! Telekinesis tuning parsed from telekinesis.toml files

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::game::constants;

/// How a reach phase turns the offset to its target into an impulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReachMode {
    /// Direction is normalized, so the push rate ignores remaining distance
    ConstantSpeed,
    /// Offset is used as-is, capped at `max_impulse`
    DistanceProportional,
}

/// Physics world section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Downward gravity magnitude
    pub gravity: f32,
    /// Fixed simulation step in seconds
    pub timestep: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: constants::physics::DEFAULT_GRAVITY,
            timestep: constants::physics::TIMESTEP,
        }
    }
}

/// Lift phase section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LiftConfig {
    pub duration_seconds: f32,
    pub height: f32,
    /// Lift progress at which the Reach phase starts alongside the Lift
    pub reach_transition_fraction: f32,
    pub tick_interval_seconds: f64,
    /// Minimum angular impulse applied on reach entry so held objects aren't static
    pub angular_impulse_min_strength: f32,
    /// Maximum angular impulse applied on reach entry
    pub angular_impulse_max_strength: f32,
}

impl Default for LiftConfig {
    fn default() -> Self {
        use constants::lift::*;
        Self {
            duration_seconds: DURATION_SECONDS,
            height: HEIGHT,
            reach_transition_fraction: REACH_TRANSITION_FRACTION,
            tick_interval_seconds: TICK_INTERVAL_SECONDS,
            angular_impulse_min_strength: ANGULAR_IMPULSE_MIN_STRENGTH,
            angular_impulse_max_strength: ANGULAR_IMPULSE_MAX_STRENGTH,
        }
    }
}

/// Reach phase section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReachConfig {
    pub pull_speed_multiplier: f32,
    pub push_speed_multiplier: f32,
    pub pull_mode: ReachMode,
    pub push_mode: ReachMode,
    pub max_impulse: f32,
    pub mass_min: f32,
    pub mass_max: f32,
    pub mass_multiplier_min: f32,
    pub mass_multiplier_max: f32,
    pub collision_bounciness: f32,
    pub held_linear_damping: f32,
    pub resting_linear_damping: f32,
    pub tick_interval_seconds: f64,
}

impl Default for ReachConfig {
    fn default() -> Self {
        use constants::reach::*;
        Self {
            pull_speed_multiplier: PULL_SPEED_MULTIPLIER,
            push_speed_multiplier: PUSH_SPEED_MULTIPLIER,
            pull_mode: ReachMode::ConstantSpeed,
            push_mode: ReachMode::DistanceProportional,
            max_impulse: MAX_IMPULSE,
            mass_min: MASS_MIN,
            mass_max: MASS_MAX,
            mass_multiplier_min: MASS_MULTIPLIER_MIN,
            mass_multiplier_max: MASS_MULTIPLIER_MAX,
            collision_bounciness: COLLISION_BOUNCINESS,
            held_linear_damping: HELD_LINEAR_DAMPING,
            resting_linear_damping: RESTING_LINEAR_DAMPING,
            tick_interval_seconds: TICK_INTERVAL_SECONDS,
        }
    }
}

impl ReachConfig {
    /// Maps mass onto the impulse multiplier: lighter bodies get larger impulses.
    /// Clamped to `mass_multiplier_max` at or below `mass_min` and to
    /// `mass_multiplier_min` at or above `mass_max`.
    pub fn mass_multiplier(&self, mass: f32) -> f32 {
        let span = self.mass_max - self.mass_min;
        if span.abs() <= f32::EPSILON {
            return if mass <= self.mass_min {
                self.mass_multiplier_max
            } else {
                self.mass_multiplier_min
            };
        }
        let t = ((mass - self.mass_min) / span).clamp(0.0, 1.0);
        self.mass_multiplier_max + (self.mass_multiplier_min - self.mass_multiplier_max) * t
    }
}

/// Jitter section, intervals in reach ticks
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JitterConfig {
    pub frame_interval_min: u32,
    pub frame_interval_max: u32,
    pub strength_min: u32,
    pub strength_max: u32,
}

impl Default for JitterConfig {
    fn default() -> Self {
        use constants::jitter::*;
        Self {
            frame_interval_min: FRAME_INTERVAL_MIN,
            frame_interval_max: FRAME_INTERVAL_MAX,
            strength_min: STRENGTH_MIN,
            strength_max: STRENGTH_MAX,
        }
    }
}

/// Mini prop attraction section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AttractionConfig {
    /// Radius of the sensor volume around every primary prop
    pub field_radius: f32,
    /// Acceleration applied to a spawned mini prop unless overridden per prop
    pub force: f32,
    pub held_linear_damping: f32,
    pub resting_linear_damping: f32,
}

impl Default for AttractionConfig {
    fn default() -> Self {
        use constants::attraction::*;
        Self {
            field_radius: FIELD_RADIUS,
            force: FORCE,
            held_linear_damping: HELD_LINEAR_DAMPING,
            resting_linear_damping: RESTING_LINEAR_DAMPING,
        }
    }
}

/// Holder targeting section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TargetingConfig {
    pub detection_radius: f32,
    pub detection_distance: f32,
    pub throw_trace_distance: f32,
}

impl Default for TargetingConfig {
    fn default() -> Self {
        use constants::targeting::*;
        Self {
            detection_radius: DETECTION_RADIUS,
            detection_distance: DETECTION_DISTANCE,
            throw_trace_distance: THROW_TRACE_DISTANCE,
        }
    }
}

/// Holder section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HolderConfig {
    /// Anchor point in the holder's local frame (x right, y up, z forward)
    pub anchor_offset: [f32; 3],
}

impl Default for HolderConfig {
    fn default() -> Self {
        Self {
            anchor_offset: constants::targeting::ANCHOR_OFFSET,
        }
    }
}

/// Spring-arm placement the host camera blends toward
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CameraRig {
    pub arm_length: f32,
    pub offset_right: f32,
    pub offset_up: f32,
}

/// Camera section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub default: CameraRig,
    pub zoom: CameraRig,
}

impl Default for CameraConfig {
    fn default() -> Self {
        use constants::camera::*;
        Self {
            default: CameraRig {
                arm_length: DEFAULT_ARM_LENGTH,
                offset_right: DEFAULT_OFFSET_RIGHT,
                offset_up: DEFAULT_OFFSET_UP,
            },
            zoom: CameraRig {
                arm_length: ZOOM_ARM_LENGTH,
                offset_right: ZOOM_OFFSET_RIGHT,
                offset_up: ZOOM_OFFSET_UP,
            },
        }
    }
}

/// Full tuning set from telekinesis.toml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TelekinesisConfig {
    pub physics: PhysicsConfig,
    pub lift: LiftConfig,
    pub reach: ReachConfig,
    pub jitter: JitterConfig,
    pub attraction: AttractionConfig,
    pub targeting: TargetingConfig,
    pub holder: HolderConfig,
    pub camera: CameraConfig,
}

impl TelekinesisConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;

        Self::from_toml_str(&content).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
    }

    /// Load configuration from a directory
    /// Looks for telekinesis.toml in the given directory
    pub fn from_dir(dir: &Path) -> Result<Self, ConfigError> {
        Self::from_file(&dir.join("telekinesis.toml"))
    }
}

/// Errors that can occur when loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse {}: {}", .0.display(), .1)]
    Parse(PathBuf, #[source] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = TelekinesisConfig::from_toml_str("").unwrap();
        assert_eq!(config.lift.duration_seconds, 0.5);
        assert_eq!(config.lift.height, 150.0);
        assert_eq!(config.reach.pull_mode, ReachMode::ConstantSpeed);
        assert_eq!(config.reach.push_mode, ReachMode::DistanceProportional);
        assert_eq!(config.jitter.frame_interval_min, 10);
        assert_eq!(config.camera.zoom.arm_length, 200.0);
    }

    #[test]
    fn test_parse_partial_sections() {
        let toml = r#"
            [lift]
            height = 90.0

            [reach]
            push_mode = "constant_speed"
            collision_bounciness = 3.5

            [camera.zoom]
            arm_length = 180.0
            offset_right = 40.0
            offset_up = 5.0
        "#;
        let config = TelekinesisConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.lift.height, 90.0);
        assert_eq!(config.lift.duration_seconds, 0.5);
        assert_eq!(config.reach.push_mode, ReachMode::ConstantSpeed);
        assert_eq!(config.reach.collision_bounciness, 3.5);
        assert_eq!(config.camera.zoom.offset_right, 40.0);
        assert_eq!(config.camera.default.arm_length, 250.0);
    }

    #[test]
    fn test_mass_multiplier_is_clamped_and_monotonic() {
        let reach = ReachConfig::default();
        assert_eq!(reach.mass_multiplier(10.0), 5.0);
        assert_eq!(reach.mass_multiplier(50.0), 5.0);
        assert_eq!(reach.mass_multiplier(700.0), 1.0);
        assert_eq!(reach.mass_multiplier(5000.0), 1.0);
        assert!((reach.mass_multiplier(375.0) - 3.0).abs() < 1e-5);

        let mut previous = f32::MAX;
        for step in 0..=100 {
            let m = reach.mass_multiplier(step as f32 * 10.0);
            assert!(m <= previous);
            previous = m;
        }
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = TelekinesisConfig::from_file(Path::new("/nonexistent/telekinesis.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io(..)));
        assert!(err.to_string().contains("/nonexistent/telekinesis.toml"));
    }

    #[test]
    fn test_rejects_unknown_reach_mode() {
        let toml = r#"
            [reach]
            pull_mode = "teleport"
        "#;
        assert!(TelekinesisConfig::from_toml_str(toml).is_err());
    }
}
