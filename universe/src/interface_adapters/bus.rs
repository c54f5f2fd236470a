// In-process stand-in for the host's cross-window event bus.

use crate::interface_adapters::protocol::{decode_bus, encode_bus};
use crate::use_cases::types::{BusEnvelope, WindowInput};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

const LOG_THROTTLE: Duration = Duration::from_secs(2);

/// Every window on the bus sees every publish, its own included.
#[derive(Clone)]
pub struct LocalBus {
    tx: broadcast::Sender<Arc<str>>,
}

impl LocalBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Serializes once and shares the text with all subscribers.
    pub fn publish(&self, envelope: BusEnvelope) {
        let text = match encode_bus(envelope) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "failed to serialize bus message");
                return;
            }
        };
        // No subscribers just means no other window is open yet.
        let _ = self.tx.send(Arc::from(text));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<str>> {
        self.tx.subscribe()
    }
}

/// Feeds bus traffic into one window's input queue until either side closes.
pub async fn bus_listener(
    label: String,
    mut bus_rx: broadcast::Receiver<Arc<str>>,
    input_tx: mpsc::Sender<WindowInput>,
) {
    let mut last_invalid_log = Instant::now()
        .checked_sub(LOG_THROTTLE)
        .unwrap_or_else(Instant::now);
    loop {
        match bus_rx.recv().await {
            Ok(text) => {
                let envelope = match decode_bus(&text) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        if should_log(&mut last_invalid_log) {
                            warn!(window = %label, error = %e, "dropping malformed bus message");
                        }
                        continue;
                    }
                };
                if envelope.sender == label {
                    continue;
                }
                if input_tx.send(WindowInput::Bus(envelope)).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                // Dropped window announces are repaired by the next re-announce.
                warn!(window = %label, missed = n, "bus listener lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    debug!(window = %label, "bus listener exiting");
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::types::BusMessage;

    #[tokio::test]
    async fn when_a_window_publishes_then_only_other_windows_receive_it() {
        let bus = LocalBus::new(16);
        let (a_tx, mut a_rx) = mpsc::channel(8);
        let (b_tx, mut b_rx) = mpsc::channel(8);
        tokio::spawn(bus_listener("a".to_string(), bus.subscribe(), a_tx));
        tokio::spawn(bus_listener("b".to_string(), bus.subscribe(), b_tx));

        bus.publish(BusEnvelope {
            sender: "a".to_string(),
            message: BusMessage::ObjectRequest,
        });

        let received = b_rx.recv().await.expect("b receives");
        assert!(matches!(
            received,
            WindowInput::Bus(BusEnvelope { ref sender, message: BusMessage::ObjectRequest }) if sender == "a"
        ));
        assert!(a_rx.try_recv().is_err());
    }
}
