// Use cases layer: per-window components and the loop that drives them.

pub mod city;
pub mod relay;
pub mod scene_store;
pub mod session;
pub mod sync;
pub mod topology;
pub mod types;
pub mod viewport;
pub mod window;

pub use session::{SessionSettings, UniverseSession, WindowContext};
pub use types::{BusEnvelope, BusMessage, ObjectEvent, SessionEffect, WindowInput};
pub use window::{WindowTiming, window_task};
