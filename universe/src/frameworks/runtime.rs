// Framework bootstrap for the headless universe runtime.

use crate::domain::object::ObjectKind;
use crate::domain::ports::{Clock, DirectoryReader, HostShell, WindowSpec};
use crate::domain::window::WindowRect;
use crate::frameworks::config;
use crate::interface_adapters::bus::{LocalBus, bus_listener};
use crate::interface_adapters::clock::SystemClock;
use crate::interface_adapters::effects::{EffectPorts, effect_executor};
use crate::interface_adapters::fs::{TokioDirectoryReader, is_directory};
use crate::interface_adapters::host::{HeadlessHost, bounds_poller};
use crate::interface_adapters::net::relay_transport;
use crate::interface_adapters::utils::rng::window_label;
use crate::use_cases::relay::{Backoff, RetryPolicy};
use crate::use_cases::{
    SessionSettings, UniverseSession, WindowContext, WindowInput, WindowTiming, window_task,
};

use std::future::Future;
use std::io::Result;
use std::sync::Arc;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;

pub fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

/// Settings shared by every window of one runtime.
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    /// Windows opened at startup, laid out so neighbors overlap.
    pub windows: usize,

    pub relay_url: String,

    pub relay_autoconnect: bool,

    /// Directory explored by the first window, if any.
    pub city_root: Option<String>,

    pub seed_objects: usize,

    pub timing: WindowTiming,

    pub session: SessionSettings,
}

impl RuntimeSettings {
    pub fn from_env() -> Self {
        Self {
            windows: config::window_count(),
            relay_url: config::relay_url(),
            relay_autoconnect: config::relay_autoconnect(),
            city_root: config::city_root(),
            seed_objects: config::seed_objects(),
            timing: WindowTiming {
                frame: config::frame_interval(),
                protocol: config::protocol_interval(),
            },
            session: SessionSettings {
                relay_policy: RetryPolicy {
                    max_attempts: config::relay_max_reconnects(),
                    backoff: Backoff::Fixed(config::relay_reconnect_delay()),
                },
                heartbeat_interval: config::relay_heartbeat_interval(),
                ..SessionSettings::default()
            },
        }
    }
}

struct WindowHandle {
    label: String,
    shutdown: Arc<Notify>,
    join: JoinHandle<UniverseSession>,
}

struct Launcher {
    settings: RuntimeSettings,
    bus: LocalBus,
    clock: Arc<dyn Clock>,
    window_tx: mpsc::Sender<WindowSpec>,
}

impl Launcher {
    /// Wires one window: loop, bus listener, bounds poller, relay transport
    /// and effect executor.
    fn spawn_window(&self, spec: WindowSpec) -> (WindowHandle, mpsc::Sender<WindowInput>) {
        let label = spec.label.clone();
        let (input_tx, input_rx) = mpsc::channel(config::INPUT_CHANNEL_CAPACITY);
        let (effects_tx, effects_rx) = mpsc::channel(config::EFFECT_CHANNEL_CAPACITY);
        let (relay_tx, relay_rx) = mpsc::channel(config::RELAY_COMMAND_CAPACITY);
        let shutdown = Arc::new(Notify::new());
        let host: Arc<dyn HostShell> = Arc::new(HeadlessHost::new(spec.rect, self.window_tx.clone()));

        tokio::spawn(bus_listener(label.clone(), self.bus.subscribe(), input_tx.clone()));
        tokio::spawn(bounds_poller(
            label.clone(),
            host.clone(),
            input_tx.clone(),
            self.settings.timing.protocol,
        ));
        tokio::spawn(relay_transport(
            label.clone(),
            self.settings.relay_url.clone(),
            relay_rx,
            input_tx.clone(),
        ));
        tokio::spawn(effect_executor(
            EffectPorts {
                label: label.clone(),
                bus: self.bus.clone(),
                relay_tx,
                input_tx: input_tx.clone(),
                host,
                reader: Arc::new(TokioDirectoryReader),
            },
            effects_rx,
        ));

        let session = UniverseSession::new(
            WindowContext::new(label.clone(), spec.rect),
            self.settings.session.clone(),
            self.clock.now_millis(),
        );
        let join = tokio::spawn(window_task(
            session,
            input_rx,
            effects_tx,
            self.clock.clone(),
            self.settings.timing,
            shutdown.clone(),
        ));
        tracing::info!(window = %label, rect = ?spec.rect, "window opened");

        let handle = WindowHandle {
            label,
            shutdown,
            join,
        };
        (handle, input_tx)
    }

    /// Startup actions a headless window performs in place of a user.
    async fn seed(&self, index: usize, input_tx: &mpsc::Sender<WindowInput>) {
        let mut inputs = Vec::new();
        for n in 0..self.settings.seed_objects {
            let kinds = ObjectKind::SPAWNABLE;
            inputs.push(WindowInput::AddObject(kinds[(index + n) % kinds.len()]));
        }
        if self.settings.relay_autoconnect {
            inputs.push(WindowInput::RelayConnect);
        }
        if index == 0
            && let Some(root) = self.city_root().await
        {
            inputs.push(WindowInput::LoadCity(root));
        }
        for input in inputs {
            if input_tx.send(input).await.is_err() {
                break;
            }
        }
    }

    /// `UNIVERSE_CITY`, with `~` standing for the home directory.
    async fn city_root(&self) -> Option<String> {
        let root = self.settings.city_root.as_deref()?;
        let path = if root == "~" {
            match TokioDirectoryReader.home_directory().await {
                Ok(home) => home,
                Err(e) => {
                    tracing::warn!(error = %e, "cannot resolve home directory; skipping city");
                    return None;
                }
            }
        } else {
            root.to_string()
        };
        if !is_directory(&path).await {
            tracing::warn!(%path, "UNIVERSE_CITY is not a directory; skipping");
            return None;
        }
        Some(path)
    }
}

/// Runs windows until `shutdown` resolves, then closes them all.
pub async fn run(settings: RuntimeSettings, shutdown: impl Future<Output = ()>) -> Result<()> {
    let (window_tx, mut window_rx) = mpsc::channel(config::WINDOW_REQUEST_CAPACITY);
    let launcher = Launcher {
        bus: LocalBus::new(config::BUS_CAPACITY),
        clock: Arc::new(SystemClock),
        window_tx,
        settings,
    };

    let mut windows = Vec::new();
    for index in 0..launcher.settings.windows {
        let rect = WindowRect::new(
            index as i32 * config::WINDOW_STRIDE,
            0,
            config::WINDOW_WIDTH,
            config::WINDOW_HEIGHT,
        );
        let label = window_label();
        let spec = WindowSpec {
            url: format!("index.html?window={label}"),
            title: "Universe".to_string(),
            label,
            rect,
        };
        let (handle, input_tx) = launcher.spawn_window(spec);
        launcher.seed(index, &input_tx).await;
        windows.push(handle);
    }

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            Some(spec) = window_rx.recv() => {
                let (handle, _input_tx) = launcher.spawn_window(spec);
                windows.push(handle);
            }
        }
    }

    tracing::info!(windows = windows.len(), "shutting down");
    for window in &windows {
        window.shutdown.notify_one();
    }
    for window in windows {
        match window.join.await {
            Ok(session) => tracing::debug!(
                window = %window.label,
                objects = session.store().len(),
                "window closed"
            ),
            Err(e) => tracing::error!(window = %window.label, error = %e, "window task failed"),
        }
    }
    Ok(())
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();
    let settings = RuntimeSettings::from_env();
    tracing::info!(
        windows = settings.windows,
        relay_url = %settings.relay_url,
        "starting universe"
    );

    run(settings, async {
        let _ = tokio::signal::ctrl_c()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "failed to listen for ctrl-c"));
    })
    .await
}
