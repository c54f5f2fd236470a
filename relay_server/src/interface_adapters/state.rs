use crate::use_cases::HubEvent;
use tokio::sync::mpsc;

#[derive(Clone)]
pub struct AppState {
    // Connection lifecycle and relay messages flowing into the hub task.
    pub hub_tx: mpsc::Sender<HubEvent>,
    // Per-connection outbox depth.
    pub outbox_capacity: usize,
}
