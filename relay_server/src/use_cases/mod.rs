pub mod hub;
pub mod task;

pub use hub::{ConnId, Delivery, RelayHub};
pub use task::{HubEvent, HubSettings, hub_task};
