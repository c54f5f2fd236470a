// Executes session effects against the bus, relay transport and host ports.

use crate::domain::ports::{DirectoryReader, HostShell};
use crate::interface_adapters::bus::LocalBus;
use crate::use_cases::types::{
    HostRequest, Notice, NoticeLevel, RelayCommand, SessionEffect, WindowInput,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};

const LOG_THROTTLE: Duration = Duration::from_secs(2);

/// Everything one window's effects can reach.
#[derive(Clone)]
pub struct EffectPorts {
    pub label: String,
    pub bus: LocalBus,
    pub relay_tx: mpsc::Sender<RelayCommand>,
    /// Results of slow calls re-enter the window loop here.
    pub input_tx: mpsc::Sender<WindowInput>,
    pub host: Arc<dyn HostShell>,
    pub reader: Arc<dyn DirectoryReader>,
}

/// Runs until the window loop drops its effect sender. Slow port calls are
/// spawned so a directory listing never stalls bus traffic. Nothing here
/// awaits a channel: the relay transport feeds the window's input queue, so a
/// blocking send would close a loop back to the window task.
pub async fn effect_executor(ports: EffectPorts, mut effects_rx: mpsc::Receiver<SessionEffect>) {
    let mut last_full_log = Instant::now()
        .checked_sub(LOG_THROTTLE)
        .unwrap_or_else(Instant::now);
    let mut dropped_commands: u64 = 0;

    while let Some(effect) = effects_rx.recv().await {
        match effect {
            SessionEffect::Publish(envelope) => ports.bus.publish(envelope),
            SessionEffect::Relay(command) => match ports.relay_tx.try_send(command) {
                Ok(()) => {}
                Err(TrySendError::Full(command)) => {
                    dropped_commands += 1;
                    if should_log(&mut last_full_log) {
                        warn!(
                            window = %ports.label,
                            dropped = dropped_commands,
                            ?command,
                            "relay transport backed up; dropping command"
                        );
                    }
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(window = %ports.label, "relay transport stopped; dropping command");
                }
            },
            SessionEffect::Host(request) => {
                tokio::spawn(run_host_request(ports.clone(), request));
            }
            SessionEffect::LoadDirectory(path) => {
                let ports = ports.clone();
                tokio::spawn(async move {
                    let result = ports.reader.list_directory(&path).await;
                    let _ = ports
                        .input_tx
                        .send(WindowInput::DirectoryListed { path, result })
                        .await;
                });
            }
            SessionEffect::LoadParent { from, root } => {
                let ports = ports.clone();
                tokio::spawn(async move {
                    let parent = ports.reader.parent_of(&from);
                    let path = if parent == from { root } else { parent };
                    let result = ports.reader.list_directory(&path).await;
                    let _ = ports
                        .input_tx
                        .send(WindowInput::DirectoryListed { path, result })
                        .await;
                });
            }
            SessionEffect::PickDirectory => {
                let ports = ports.clone();
                tokio::spawn(async move {
                    let result = ports.reader.pick_directory().await;
                    let _ = ports.input_tx.send(WindowInput::DirectoryPicked(result)).await;
                });
            }
            SessionEffect::Notify(notice) => show_notice(&ports.label, &notice),
        }
    }
    debug!(window = %ports.label, "effect executor exiting");
}

async fn run_host_request(ports: EffectPorts, request: HostRequest) {
    match request {
        HostRequest::RequestPointerCapture => {
            let granted = ports
                .host
                .request_pointer_capture()
                .await
                .inspect_err(|e| warn!(window = %ports.label, error = %e, "pointer capture failed"))
                .unwrap_or(false);
            let _ = ports.input_tx.send(WindowInput::CaptureChanged(granted)).await;
        }
        HostRequest::ReleasePointerCapture => {
            if let Err(e) = ports.host.release_pointer_capture().await {
                debug!(window = %ports.label, error = %e, "pointer release failed");
            }
        }
        HostRequest::OpenPath(path) => {
            if let Err(e) = ports.host.open_path(&path).await {
                warn!(window = %ports.label, %path, error = %e, "cannot open path");
            }
        }
        HostRequest::CreateWindow(spec) => {
            let label = spec.label.clone();
            if let Err(e) = ports.host.create_window(spec).await {
                error!(window = %ports.label, new = %label, error = %e, "failed to create window");
            }
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

/// Toasts have no UI in a headless run; they go to the log.
fn show_notice(label: &str, notice: &Notice) {
    match notice.level {
        NoticeLevel::Info => info!(window = %label, message = %notice.message, "notice"),
        NoticeLevel::Warning => warn!(window = %label, message = %notice.message, "notice"),
        NoticeLevel::Error => error!(window = %label, message = %notice.message, "notice"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::{FsError, HostError};
    use crate::domain::ports::{DirEntry, WindowSpec};
    use crate::domain::window::WindowRect;
    use crate::use_cases::types::{BusEnvelope, BusMessage};
    use async_trait::async_trait;

    struct GrantingHost;

    #[async_trait]
    impl HostShell for GrantingHost {
        async fn outer_bounds(&self) -> Result<WindowRect, HostError> {
            Ok(WindowRect::new(0, 0, 100, 100))
        }

        async fn request_pointer_capture(&self) -> Result<bool, HostError> {
            Ok(true)
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

    struct FixedListing;

    #[async_trait]
    impl DirectoryReader for FixedListing {
        async fn list_directory(&self, path: &str) -> Result<Vec<DirEntry>, FsError> {
            Ok(vec![DirEntry {
                name: "docs".to_string(),
                path: format!("{path}/docs"),
                is_directory: Some(true),
            }])
        }

        async fn home_directory(&self) -> Result<String, FsError> {
            Ok("/home/u".to_string())
        }

        async fn pick_directory(&self) -> Result<String, FsError> {
            Err(FsError::Cancelled)
        }
    }

    fn ports() -> (EffectPorts, mpsc::Receiver<RelayCommand>, mpsc::Receiver<WindowInput>) {
        let (relay_tx, relay_rx) = mpsc::channel(4);
        let (input_tx, input_rx) = mpsc::channel(4);
        let ports = EffectPorts {
            label: "w".to_string(),
            bus: LocalBus::new(4),
            relay_tx,
            input_tx,
            host: Arc::new(GrantingHost),
            reader: Arc::new(FixedListing),
        };
        (ports, relay_rx, input_rx)
    }

    #[tokio::test]
    async fn when_capture_is_requested_then_the_grant_is_fed_back() {
        let (ports, _relay_rx, mut input_rx) = ports();
        let (effects_tx, effects_rx) = mpsc::channel(4);
        tokio::spawn(effect_executor(ports, effects_rx));

        effects_tx
            .send(SessionEffect::Host(HostRequest::RequestPointerCapture))
            .await
            .expect("send");
        assert!(matches!(
            input_rx.recv().await,
            Some(WindowInput::CaptureChanged(true))
        ));
    }

    #[tokio::test]
    async fn when_a_directory_is_loaded_then_the_listing_is_fed_back() {
        let (ports, mut relay_rx, mut input_rx) = ports();
        let (effects_tx, effects_rx) = mpsc::channel(4);
        tokio::spawn(effect_executor(ports, effects_rx));

        effects_tx
            .send(SessionEffect::LoadDirectory("/home/u".to_string()))
            .await
            .expect("send");
        match input_rx.recv().await {
            Some(WindowInput::DirectoryListed { path, result }) => {
                assert_eq!(path, "/home/u");
                assert_eq!(result.expect("listing").len(), 1);
            }
            other => panic!("unexpected input: {other:?}"),
        }

        effects_tx
            .send(SessionEffect::Relay(RelayCommand::Open))
            .await
            .expect("send");
        assert_eq!(relay_rx.recv().await, Some(RelayCommand::Open));
    }

    #[tokio::test]
    async fn when_going_back_then_the_parent_is_listed_or_the_root_at_a_filesystem_root() {
        let (ports, _relay_rx, mut input_rx) = ports();
        let (effects_tx, effects_rx) = mpsc::channel(4);
        tokio::spawn(effect_executor(ports, effects_rx));

        for (from, expected) in [("/home/u/src", "/home/u"), ("/", "/home/u")] {
            effects_tx
                .send(SessionEffect::LoadParent {
                    from: from.to_string(),
                    root: "/home/u".to_string(),
                })
                .await
                .expect("send");
            match input_rx.recv().await {
                Some(WindowInput::DirectoryListed { path, .. }) => assert_eq!(path, expected),
                other => panic!("unexpected input: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn when_the_relay_transport_is_backed_up_then_effects_keep_flowing() {
        // Nobody drains relay commands; capacity is 4.
        let (ports, mut relay_rx, _input_rx) = ports();
        let mut bus_rx = ports.bus.subscribe();
        let (effects_tx, effects_rx) = mpsc::channel(4);
        let executor = tokio::spawn(effect_executor(ports, effects_rx));

        for _ in 0..32 {
            effects_tx
                .send(SessionEffect::Relay(RelayCommand::Open))
                .await
                .expect("executor keeps draining");
        }
        effects_tx
            .send(SessionEffect::Publish(BusEnvelope {
                sender: "w".to_string(),
                message: BusMessage::ObjectRequest,
            }))
            .await
            .expect("send");
        assert!(bus_rx.recv().await.is_ok());

        drop(effects_tx);
        executor.await.expect("executor exits");
        let mut queued = 0;
        while relay_rx.try_recv().is_ok() {
            queued += 1;
        }
        assert_eq!(queued, 4);
    }
}
