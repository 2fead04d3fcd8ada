pub mod attraction;
pub mod constants;
pub mod frame_event;
pub mod holder;
pub mod instance;
pub mod mini_prop;
pub mod physics;
pub mod prop;
pub mod scheduler;

#[cfg(test)]
pub mod testing;

pub use frame_event::{FrameEvent, SoundKind};
pub use holder::{Holder, HolderMode, Viewpoint};
pub use instance::{HolderInput, InteractOutcome, TelekinesisInstance};
pub use physics::{EntityId, PhysicsWorld};
pub use prop::{Interactable, PrimaryProp, PropState, ReachTarget};
