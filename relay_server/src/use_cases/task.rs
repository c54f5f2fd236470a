// Single task that owns the hub; sockets talk to it over channels.

use super::hub::{ConnId, Delivery, RelayHub};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Notify, mpsc};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};
use universe::use_cases::types::{RelayInbound, RelayOutbound};

const LOG_THROTTLE: Duration = Duration::from_secs(2);

#[derive(Debug)]
pub enum HubEvent {
    Connected {
        conn: ConnId,
        outbox: mpsc::Sender<RelayInbound>,
    },
    Message {
        conn: ConnId,
        message: RelayOutbound,
    },
    Disconnected {
        conn: ConnId,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct HubSettings {
    pub liveness: Duration,
    pub sweep_interval: Duration,
}

pub async fn hub_task(
    mut events_rx: mpsc::Receiver<HubEvent>,
    settings: HubSettings,
    shutdown: Arc<Notify>,
) -> RelayHub {
    let started = tokio::time::Instant::now();
    let now_ms = || started.elapsed().as_millis() as u64;
    let mut hub = RelayHub::new(settings.liveness.as_millis() as u64);
    let mut outboxes: HashMap<ConnId, mpsc::Sender<RelayInbound>> = HashMap::new();
    let mut sweep = tokio::time::interval(settings.sweep_interval);
    let mut last_full_log = Instant::now();

    loop {
        tokio::select! {
            _ = shutdown.notified() => break,
            event = events_rx.recv() => {
                let Some(event) = event else { break };
                let deliveries = match event {
                    HubEvent::Connected { conn, outbox } => {
                        outboxes.insert(conn, outbox);
                        Vec::new()
                    }
                    HubEvent::Message { conn, message } => hub.handle(conn, message, now_ms()),
                    HubEvent::Disconnected { conn } => {
                        outboxes.remove(&conn);
                        hub.disconnect(conn)
                    }
                };
                deliver(&outboxes, deliveries, &mut last_full_log);
            }
            _ = sweep.tick() => {
                for conn in hub.expired(now_ms()) {
                    info!(conn, "universe went silent; dropping connection");
                    // Dropping the outbox makes the socket task close the connection.
                    outboxes.remove(&conn);
                    let deliveries = hub.disconnect(conn);
                    deliver(&outboxes, deliveries, &mut last_full_log);
                }
            }
        }
    }
    debug!(universes = hub.len(), "hub task exiting");
    hub
}

fn deliver(
    outboxes: &HashMap<ConnId, mpsc::Sender<RelayInbound>>,
    deliveries: Vec<Delivery>,
    last_full_log: &mut Instant,
) {
    for Delivery { conn, message } in deliveries {
        let Some(outbox) = outboxes.get(&conn) else {
            continue;
        };
        match outbox.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                if should_log(last_full_log) {
                    warn!(conn, "connection outbox full; dropping relay message");
                }
            }
            Err(TrySendError::Closed(_)) => debug!(conn, "connection already gone"),
        }
    }
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

    fn settings() -> HubSettings {
        HubSettings {
            liveness: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn when_a_universe_connects_then_the_ack_reaches_its_outbox() {
        let (events_tx, events_rx) = mpsc::channel(8);
        let shutdown = Arc::new(Notify::new());
        let task = tokio::spawn(hub_task(events_rx, settings(), shutdown.clone()));

        let (outbox, mut inbox) = mpsc::channel(8);
        events_tx
            .send(HubEvent::Connected { conn: 7, outbox })
            .await
            .expect("send");
        events_tx
            .send(HubEvent::Message {
                conn: 7,
                message: RelayOutbound::Connect {
                    code: "QWERTY".to_string(),
                },
            })
            .await
            .expect("send");

        assert_eq!(
            inbox.recv().await,
            Some(RelayInbound::Connected {
                code: "QWERTY".to_string()
            })
        );

        shutdown.notify_one();
        let hub = task.await.expect("hub task");
        assert_eq!(hub.code_of(7), Some("QWERTY"));
    }

    #[tokio::test(start_paused = true)]
    async fn when_a_universe_stops_heartbeating_then_its_outbox_is_dropped() {
        let (events_tx, events_rx) = mpsc::channel(8);
        let shutdown = Arc::new(Notify::new());
        tokio::spawn(hub_task(events_rx, settings(), shutdown));

        let (outbox, mut inbox) = mpsc::channel(8);
        events_tx
            .send(HubEvent::Connected { conn: 1, outbox })
            .await
            .expect("send");
        events_tx
            .send(HubEvent::Message {
                conn: 1,
                message: RelayOutbound::Connect {
                    code: "SILENT".to_string(),
                },
            })
            .await
            .expect("send");
        assert!(matches!(inbox.recv().await, Some(RelayInbound::Connected { .. })));

        // Paused time auto-advances while the test waits on the closed inbox.
        assert_eq!(inbox.recv().await, None);
    }
}
