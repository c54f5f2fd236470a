// Gameplay tuning, kept apart from runtime configuration.

pub mod camera;
pub mod player;
pub mod sync;

pub use camera::CameraTuning;
pub use player::PlayerTuning;
pub use sync::SyncTuning;
