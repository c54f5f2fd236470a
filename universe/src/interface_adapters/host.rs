// Host shell for headless runs: no pointer capture, windows are spawned in-process.

use crate::domain::errors::HostError;
use crate::domain::ports::{HostShell, WindowSpec};
use crate::domain::window::WindowRect;
use crate::use_cases::types::WindowInput;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const LOG_THROTTLE: Duration = Duration::from_secs(2);

pub struct HeadlessHost {
    bounds: WindowRect,
    window_requests: mpsc::Sender<WindowSpec>,
}

impl HeadlessHost {
    pub fn new(bounds: WindowRect, window_requests: mpsc::Sender<WindowSpec>) -> Self {
        Self {
            bounds,
            window_requests,
        }
    }
}

#[async_trait]
impl HostShell for HeadlessHost {
    async fn outer_bounds(&self) -> Result<WindowRect, HostError> {
        Ok(self.bounds)
    }

    async fn request_pointer_capture(&self) -> Result<bool, HostError> {
        // Denied, so first person falls back to keyboard look.
        Ok(false)
    }

    async fn release_pointer_capture(&self) -> Result<(), HostError> {
        Ok(())
    }

    async fn open_path(&self, path: &str) -> Result<(), HostError> {
        info!(path, "open requested");
        Err(HostError::Unsupported("opening files"))
    }

    async fn create_window(&self, spec: WindowSpec) -> Result<(), HostError> {
        self.window_requests
            .send(spec)
            .await
            .map_err(|_| HostError::Failed("window launcher stopped".to_string()))
    }
}

/// Samples the host's outer bounds every `period` and feeds changes into the
/// window's input queue. Stops once the window loop drops its receiver.
pub async fn bounds_poller(
    label: String,
    host: Arc<dyn HostShell>,
    input_tx: mpsc::Sender<WindowInput>,
    period: Duration,
) {
    let mut interval = tokio::time::interval(period);
    let mut last_sent: Option<WindowRect> = None;
    let mut last_error_log = Instant::now()
        .checked_sub(LOG_THROTTLE)
        .unwrap_or_else(Instant::now);

    loop {
        tokio::select! {
            _ = input_tx.closed() => break,
            _ = interval.tick() => {}
        }

        let rect = match host.outer_bounds().await {
            Ok(rect) => rect,
            Err(e) => {
                if should_log(&mut last_error_log) {
                    warn!(window = %label, error = %e, "cannot read window bounds");
                }
                continue;
            }
        };
        if last_sent == Some(rect) {
            continue;
        }
        if input_tx.send(WindowInput::Bounds(rect)).await.is_err() {
            break;
        }
        last_sent = Some(rect);
    }
    debug!(window = %label, "bounds poller exiting");
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
    use std::sync::Mutex;

    /// Reports whatever rectangle the test last placed the window at.
    struct MovableHost(Mutex<WindowRect>);

    impl MovableHost {
        fn place(&self, rect: WindowRect) {
            *self.0.lock().expect("lock") = rect;
        }
    }

    #[async_trait]
    impl HostShell for MovableHost {
        async fn outer_bounds(&self) -> Result<WindowRect, HostError> {
            Ok(*self.0.lock().expect("lock"))
        }

        async fn request_pointer_capture(&self) -> Result<bool, HostError> {
            Ok(false)
        }

        async fn release_pointer_capture(&self) -> Result<(), HostError> {
            Ok(())
        }

        async fn open_path(&self, _path: &str) -> Result<(), HostError> {
            Ok(())
        }

        async fn create_window(&self, _spec: WindowSpec) -> Result<(), HostError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn when_the_host_window_moves_then_new_bounds_reach_the_input_queue() {
        let host = Arc::new(MovableHost(Mutex::new(WindowRect::new(0, 0, 800, 600))));
        let (input_tx, mut input_rx) = mpsc::channel(8);
        let poller = tokio::spawn(bounds_poller(
            "w".to_string(),
            host.clone(),
            input_tx,
            Duration::from_millis(150),
        ));

        assert!(matches!(
            input_rx.recv().await,
            Some(WindowInput::Bounds(rect)) if rect == WindowRect::new(0, 0, 800, 600)
        ));

        // Unchanged bounds are not re-sent.
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(input_rx.try_recv().is_err());

        host.place(WindowRect::new(250, 40, 800, 600));
        assert!(matches!(
            input_rx.recv().await,
            Some(WindowInput::Bounds(rect)) if rect == WindowRect::new(250, 40, 800, 600)
        ));

        drop(input_rx);
        poller.await.expect("poller stops with the window");
    }

    #[tokio::test]
    async fn when_creating_a_window_then_the_spec_reaches_the_launcher() {
        let (tx, mut rx) = mpsc::channel(1);
        let host = HeadlessHost::new(WindowRect::new(0, 0, 800, 600), tx);
        assert!(!host.request_pointer_capture().await.expect("capture"));

        let spec = WindowSpec {
            label: "universe-2".to_string(),
            url: "index.html?window=universe-2".to_string(),
            title: "Universe".to_string(),
            rect: WindowRect::new(40, 40, 800, 600),
        };
        host.create_window(spec.clone()).await.expect("create");
        assert_eq!(rx.recv().await, Some(spec));

        drop(rx);
        assert!(host.create_window(spec_for("x")).await.is_err());
    }

    fn spec_for(label: &str) -> WindowSpec {
        WindowSpec {
            label: label.to_string(),
            url: String::new(),
            title: String::new(),
            rect: WindowRect::new(0, 0, 1, 1),
        }
    }
}
