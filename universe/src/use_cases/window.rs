use super::session::UniverseSession;
use super::types::{SessionEffect, WindowInput};
use crate::domain::ports::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{Notify, mpsc};
use tracing::{debug, info};

/// Cadences of the window loop.
#[derive(Debug, Clone, Copy)]
pub struct WindowTiming {
    /// Render frame period; the viewport throttle may skip some of these.
    pub frame: Duration,

    /// Topology polling, sync buffer aging and relay timers.
    pub protocol: Duration,
}

impl Default for WindowTiming {
    fn default() -> Self {
        Self {
            frame: Duration::from_millis(16),
            protocol: Duration::from_millis(150),
        }
    }
}

/// Cooperative loop for one universe window. Inputs are drained once per
/// frame, effects leave through `effects_tx`. Returns the session after a
/// clean shutdown so callers can inspect the final state.
pub async fn window_task(
    mut session: UniverseSession,
    mut input_rx: mpsc::Receiver<WindowInput>,
    effects_tx: mpsc::Sender<SessionEffect>,
    clock: Arc<dyn Clock>,
    timing: WindowTiming,
    shutdown: Arc<Notify>,
) -> UniverseSession {
    let mut interval = tokio::time::interval(timing.frame);
    let protocol_ms = timing.protocol.as_millis() as u64;
    let mut last_protocol_ms: Option<u64> = None;

    session.start(clock.now_millis());
    info!(window = %session.label(), "window loop started");

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                break;
            }
            _ = interval.tick() => {}
        }

        let now = clock.now_millis();
        let mut inputs_closed = false;
        loop {
            match input_rx.try_recv() {
                Ok(input) => session.handle(input, now),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    inputs_closed = true;
                    break;
                }
            }
        }

        let protocol_due = last_protocol_ms.is_none_or(|last| now.saturating_sub(last) >= protocol_ms);
        if protocol_due {
            session.tick(now);
            last_protocol_ms = Some(now);
        }
        session.frame(now);

        if !flush(&mut session, &effects_tx).await || inputs_closed {
            debug!(window = %session.label(), inputs_closed, "window loop channels closed");
            break;
        }
    }

    session.close(clock.now_millis());
    flush(&mut session, &effects_tx).await;
    info!(window = %session.label(), "window loop stopped");
    session
}

/// Sends pending effects. Returns false once the executor is gone.
async fn flush(session: &mut UniverseSession, effects_tx: &mpsc::Sender<SessionEffect>) -> bool {
    for effect in session.take_effects() {
        if effects_tx.send(effect).await.is_err() {
            return false;
        }
    }
    true
}
