use crate::interface_adapters::state::AppState;
use crate::use_cases::{ConnId, HubEvent};

use axum::{
    Error,
    extract::{
        State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use futures::SinkExt;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::mpsc;
use tracing::{Instrument, debug, info, info_span, warn};
use universe::interface_adapters::protocol::{decode_relay, encode_relay};
use universe::interface_adapters::utils::rng::rand_id;
use universe::use_cases::types::{RelayInbound, RelayOutbound};

const LOG_THROTTLE: Duration = Duration::from_secs(2);

#[derive(Debug)]
enum NetError {
    #[allow(dead_code)]
    Ws(axum::Error),
    HubClosed,
}

enum LoopControl {
    Continue,
    Disconnect,
}

#[derive(Default)]
struct ConnStats {
    msgs_in: u64,
    msgs_out: u64,
    bytes_in: u64,
    bytes_out: u64,
    invalid_json: u32,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    // Connection id correlates logs before and after a code is claimed.
    let conn_id = rand_id();
    ws.on_upgrade(move |socket| {
        handle_socket(socket, state, conn_id).instrument(info_span!("conn", conn_id))
    })
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, conn_id: ConnId) {
    let (outbox_tx, mut outbox_rx) = mpsc::channel(state.outbox_capacity);
    if state
        .hub_tx
        .send(HubEvent::Connected {
            conn: conn_id,
            outbox: outbox_tx,
        })
        .await
        .is_err()
    {
        warn!("hub unavailable; refusing connection");
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: close_code::AGAIN,
                reason: "relay shutting down".into(),
            })))
            .await;
        return;
    }
    info!("client connected");

    let mut stats = ConnStats::default();
    if let Err(e) = run_client_loop(&mut socket, conn_id, &state, &mut outbox_rx, &mut stats).await {
        warn!(error = ?e, "client loop exited with error");
    }

    let _ = state
        .hub_tx
        .send(HubEvent::Disconnected { conn: conn_id })
        .await;
    debug!(
        msgs_in = stats.msgs_in,
        msgs_out = stats.msgs_out,
        bytes_in = stats.bytes_in,
        bytes_out = stats.bytes_out,
        invalid_json = stats.invalid_json,
        "connection stats"
    );
    info!("client disconnected");
}

async fn run_client_loop(
    socket: &mut WebSocket,
    conn_id: ConnId,
    state: &AppState,
    outbox_rx: &mut mpsc::Receiver<RelayInbound>,
    stats: &mut ConnStats,
) -> Result<(), NetError> {
    let mut close_frame: Option<CloseFrame> = None;
    let mut last_invalid_log = Instant::now();
    let mut fatal: Option<NetError> = None;

    loop {
        let disconnect = tokio::select! {
            incoming = socket.recv() => {
                match handle_incoming_ws(
                    incoming,
                    conn_id,
                    state,
                    stats,
                    &mut last_invalid_log,
                    &mut close_frame,
                ).await {
                    Ok(LoopControl::Continue) => false,
                    Ok(LoopControl::Disconnect) => true,
                    Err(e) => {
                        fatal = Some(e);
                        true
                    }
                }
            }

            outgoing = outbox_rx.recv() => {
                match outgoing {
                    Some(message) => matches!(
                        forward_message(socket, message, stats).await,
                        LoopControl::Disconnect
                    ),
                    None => {
                        // The hub released this connection.
                        close_frame = Some(CloseFrame {
                            code: close_code::POLICY,
                            reason: "universe expired".into(),
                        });
                        true
                    }
                }
            }
        };

        if disconnect {
            if let Some(frame) = close_frame.take() {
                let _ = socket.send(Message::Close(Some(frame))).await;
            }
            if let Err(err) = socket.close().await.map_err(NetError::Ws) {
                debug!(error = ?err, "socket close error");
            }
            break;
        }
    }

    match fatal {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn handle_incoming_ws(
    incoming: Option<Result<Message, Error>>,
    conn_id: ConnId,
    state: &AppState,
    stats: &mut ConnStats,
    last_invalid_log: &mut Instant,
    close_frame: &mut Option<CloseFrame>,
) -> Result<LoopControl, NetError> {
    match incoming {
        Some(Ok(msg)) => match msg {
            Message::Text(text) => {
                stats.msgs_in += 1;
                stats.bytes_in += text.len() as u64;

                let message = decode_relay(&text).and_then(RelayOutbound::try_from);
                match message {
                    Ok(message) => {
                        state
                            .hub_tx
                            .send(HubEvent::Message {
                                conn: conn_id,
                                message,
                            })
                            .await
                            .map_err(|_| NetError::HubClosed)?;
                    }
                    Err(e) => {
                        stats.invalid_json += 1;
                        if should_log(last_invalid_log) {
                            warn!(error = %e, count = stats.invalid_json, "invalid relay message");
                        }
                    }
                }
                Ok(LoopControl::Continue)
            }
            Message::Binary(_) => {
                *close_frame = Some(CloseFrame {
                    code: close_code::UNSUPPORTED,
                    reason: "binary messages not supported".into(),
                });
                Ok(LoopControl::Disconnect)
            }
            Message::Ping(_) | Message::Pong(_) => Ok(LoopControl::Continue),
            Message::Close(_) => Ok(LoopControl::Disconnect),
        },
        Some(Err(e)) => {
            warn!(error = %e, "websocket recv error");
            Ok(LoopControl::Disconnect)
        }
        None => {
            info!("websocket closed");
            Ok(LoopControl::Disconnect)
        }
    }
}

async fn forward_message(
    socket: &mut WebSocket,
    message: RelayInbound,
    stats: &mut ConnStats,
) -> LoopControl {
    let txt = match encode_relay(message) {
        Ok(txt) => txt,
        Err(e) => {
            warn!(error = %e, "failed to encode relay message");
            return LoopControl::Continue;
        }
    };
    let bytes = txt.len();
    match socket.send(Message::Text(txt.into())).await {
        Ok(()) => {
            stats.msgs_out += 1;
            stats.bytes_out += bytes as u64;
            LoopControl::Continue
        }
        Err(err) => {
            warn!(error = ?err, "failed to send relay message");
            LoopControl::Disconnect
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
