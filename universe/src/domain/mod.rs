// Domain layer: scene model, geometry, collision and the rules that act on them.

pub mod collision;
pub mod errors;
pub mod geometry;
pub mod hotspot;
pub mod input;
pub mod math;
pub mod object;
pub mod ports;
pub mod quality;
pub mod systems;
pub mod tuning;
pub mod view;
pub mod window;

pub use errors::{FsError, HostError, RelayError, SyncError};
pub use math::Vec3;
pub use object::{ObjectId, ObjectKind, ObjectProps, Origin, SceneKey, SceneObject};
