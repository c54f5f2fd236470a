// Framework bootstrap for the relay runtime.

use crate::frameworks::config;
use crate::interface_adapters::net::ws_handler;
use crate::interface_adapters::state::AppState;
use crate::use_cases::{HubSettings, hub_task};

use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::{io::Result, sync::Arc};
use tokio::sync::{Notify, mpsc};
use universe::frameworks::runtime::init_runtime;

pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    let address = listener.local_addr()?;
    let state = build_state();
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state);

    tracing::info!(%address, "listening");

    axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::from(([127, 0, 0, 1], config::http_port()));

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}

fn build_state() -> Arc<AppState> {
    let settings = HubSettings {
        liveness: config::liveness(),
        sweep_interval: config::SWEEP_INTERVAL,
    };
    tracing::debug!(liveness_ms = settings.liveness.as_millis(), "hub configured");

    // The hub lives as long as the server; nothing signals its shutdown.
    let (hub_tx, hub_rx) = mpsc::channel(config::HUB_EVENT_CAPACITY);
    tokio::spawn(hub_task(hub_rx, settings, Arc::new(Notify::new())));

    Arc::new(AppState {
        hub_tx,
        outbox_capacity: config::OUTBOX_CAPACITY,
    })
}
