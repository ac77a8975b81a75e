//! The versioned in-memory project model.
//!
//! [`project`] holds the tree types, [`mutate`] the operations over them,
//! [`normalize`]/[`revision`] the canonical form and its digest, and
//! [`store`] the revision-guarded owner that sessions hold.

pub mod diff;
pub mod mutate;
pub mod normalize;
pub mod project;
pub mod revision;
pub mod store;
pub mod usage;

pub use mutate::{DetachPolicy, MutationEffect};
pub use project::{
    Animation, Bone, Channel, ChannelKind, Cube, Face, Keyframe, ProjectState, Texture,
    TimePolicy, Trigger, TriggerKey, TriggerKind,
};
pub use revision::compute_revision;
pub use store::{MutateOutcome, ProjectStore};
