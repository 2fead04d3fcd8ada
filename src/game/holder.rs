use nalgebra::{UnitQuaternion, Vector2, Vector3};
use tracing::debug;

use super::constants::physics::EPSILON;
use super::frame_event::FrameEvent;
use super::physics::EntityId;
use crate::config::{CameraRig, TelekinesisConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HolderMode {
    Idle,
    Holding,
}

/// Camera location and unit look direction, supplied by the host every frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewpoint {
    pub origin: Vector3<f32>,
    pub forward: Vector3<f32>,
}

impl Viewpoint {
    pub fn new(origin: Vector3<f32>, forward: Vector3<f32>) -> Self {
        Self {
            origin,
            forward: forward.try_normalize(EPSILON).unwrap_or_else(Vector3::z),
        }
    }

    pub fn point_at(&self, distance: f32) -> Vector3<f32> {
        self.origin + self.forward * distance
    }
}

impl Default for Viewpoint {
    fn default() -> Self {
        Self::new(Vector3::zeros(), Vector3::z())
    }
}

/// Character-side telekinesis state.
///
/// Yaw is measured around +Y, yaw 0 faces +Z. The anchor offset is expressed in
/// the holder's local frame (x lateral, y up, z forward).
#[derive(Debug, Clone)]
pub struct Holder {
    id: EntityId,
    mode: HolderMode,
    face_forward: bool,
    orient_to_movement: bool,
    highlighted: Option<EntityId>,
    held: Option<EntityId>,
    yaw: f32,
    viewpoint: Viewpoint,
    camera: CameraRig,
    anchor_offset: Vector3<f32>,
}

impl Holder {
    pub fn new(id: EntityId, config: &TelekinesisConfig) -> Self {
        let [x, y, z] = config.holder.anchor_offset;
        Self {
            id,
            mode: HolderMode::Idle,
            face_forward: false,
            orient_to_movement: true,
            highlighted: None,
            held: None,
            yaw: 0.0,
            viewpoint: Viewpoint::default(),
            camera: config.camera.default,
            anchor_offset: Vector3::new(x, y, z),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn mode(&self) -> HolderMode {
        self.mode
    }

    pub fn is_holding(&self) -> bool {
        self.mode == HolderMode::Holding
    }

    pub fn face_forward(&self) -> bool {
        self.face_forward
    }

    pub fn orient_to_movement(&self) -> bool {
        self.orient_to_movement
    }

    pub fn highlighted(&self) -> Option<EntityId> {
        self.highlighted
    }

    pub fn held(&self) -> Option<EntityId> {
        self.held
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn viewpoint(&self) -> Viewpoint {
        self.viewpoint
    }

    /// Camera rig the host camera should be blending toward
    pub fn camera_target(&self) -> CameraRig {
        self.camera
    }

    pub fn set_viewpoint(&mut self, viewpoint: Viewpoint) {
        self.viewpoint = viewpoint;
    }

    pub fn set_highlighted(&mut self, target: Option<EntityId>) {
        self.highlighted = target;
    }

    /// Where a held prop homes to, given the holder's body position
    pub fn anchor_point(&self, position: Vector3<f32>) -> Vector3<f32> {
        let rotation = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), self.yaw);
        position + rotation * self.anchor_offset
    }

    /// Enters holding mode: camera zooms in and the body locks to the view.
    pub fn begin_hold(&mut self, prop: EntityId, config: &TelekinesisConfig, events: &mut Vec<FrameEvent>) {
        self.mode = HolderMode::Holding;
        self.held = Some(prop);
        self.face_forward = true;
        self.orient_to_movement = false;
        self.zoom(config.camera.zoom, events);
        debug!(holder = self.id, prop, "holding");
    }

    /// Leaves holding mode and hands back the prop that was held.
    pub fn release(&mut self, config: &TelekinesisConfig, events: &mut Vec<FrameEvent>) -> Option<EntityId> {
        self.mode = HolderMode::Idle;
        self.face_forward = false;
        self.orient_to_movement = true;
        self.zoom(config.camera.default, events);
        let prop = self.held.take();
        debug!(holder = self.id, prop = ?prop, "released");
        prop
    }

    fn zoom(&mut self, rig: CameraRig, events: &mut Vec<FrameEvent>) {
        self.camera = rig;
        events.push(FrameEvent::CameraZoom {
            holder: self.id,
            rig,
        });
    }

    /// Look input. While holding with the face-forward lock, the body turns with the camera.
    pub fn apply_look(&mut self, control_yaw: f32) {
        if self.is_holding() && self.face_forward {
            self.yaw = control_yaw;
        }
    }

    /// Movement input as world-space (x, z). Only orientation is handled here.
    pub fn apply_movement(&mut self, axes: Vector2<f32>) {
        if !self.orient_to_movement || axes.norm_squared() <= EPSILON * EPSILON {
            return;
        }
        self.yaw = axes.x.atan2(axes.y);
    }

    /// Clears references to an entity that was despawned.
    /// Returns true if the held prop was among them.
    pub fn forget(&mut self, entity: EntityId) -> bool {
        if self.highlighted == Some(entity) {
            self.highlighted = None;
        }
        if self.held == Some(entity) {
            self.held = None;
            self.mode = HolderMode::Idle;
            self.face_forward = false;
            self.orient_to_movement = true;
            return true;
        }
        false
    }
}
