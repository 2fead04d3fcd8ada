//! Presentation hooks emitted during a tick (particles, sound, highlight, camera)

use nalgebra::Vector3;

use super::physics::EntityId;
use crate::config::CameraRig;

/// One-shot sounds the host plays on a prop's behalf
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundKind {
    Lift,
    Push,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameEvent {
    HighlightChanged { prop: EntityId, highlighted: bool },
    /// Held-particle system switched on at the start of a lift
    LiftStarted { prop: EntityId },
    /// Latest prop location for trailing effects, every reach tick
    FeedLocation { prop: EntityId, location: Vector3<f32> },
    /// Looping wind audio attached to a held prop
    HoldAudio { prop: EntityId, active: bool },
    /// Held-particle system switched off once a throw resolves
    ParticlesDeactivated { prop: EntityId },
    /// Sparks at the impact, oriented along `direction`
    PushCollision { prop: EntityId, point: Vector3<f32>, direction: Vector3<f32> },
    PlaySound { prop: EntityId, kind: SoundKind },
    /// Camera rig the holder's camera should blend toward
    CameraZoom { holder: EntityId, rig: CameraRig },
}
