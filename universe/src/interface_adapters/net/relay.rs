// WebSocket transport for the relay client state machine.

use crate::interface_adapters::protocol::{ProtocolError, decode_relay, encode_relay};
use crate::use_cases::types::{RelayCommand, RelayInbound, RelayTransportEvent, WindowInput};
use futures_util::{SinkExt, StreamExt};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

const LOG_THROTTLE: Duration = Duration::from_secs(2);

#[derive(Debug)]
enum ConnectionEnd {
    /// The session asked to disconnect.
    Requested,
    /// The socket failed or the relay hung up.
    Lost(String),
    /// The command channel closed; the window is gone.
    Shutdown,
}

/// Executes relay commands for one window and reports transport events back
/// into its input queue. Reconnect timing is owned by the state machine; this
/// task only opens a socket when told to.
pub async fn relay_transport(
    label: String,
    url: String,
    mut command_rx: mpsc::Receiver<RelayCommand>,
    input_tx: mpsc::Sender<WindowInput>,
) {
    loop {
        match command_rx.recv().await {
            None => break,
            Some(RelayCommand::Open) => {}
            Some(RelayCommand::Send(message)) => {
                debug!(window = %label, ?message, "relay not open; dropping message");
                continue;
            }
            Some(RelayCommand::Close) => continue,
        }

        let socket = match connect_async(url.as_str()).await {
            Ok((socket, _response)) => socket,
            Err(e) => {
                warn!(window = %label, %url, error = %e, "relay connect failed");
                if report(&input_tx, RelayTransportEvent::Closed { reason: e.to_string() })
                    .await
                    .is_err()
                {
                    break;
                }
                continue;
            }
        };
        info!(window = %label, %url, "relay socket open");
        if report(&input_tx, RelayTransportEvent::Opened).await.is_err() {
            break;
        }

        let (mut sink, mut stream) = socket.split();
        let mut last_invalid_log = Instant::now()
            .checked_sub(LOG_THROTTLE)
            .unwrap_or_else(Instant::now);
        let end = loop {
            tokio::select! {
                command = command_rx.recv() => match command {
                    None => {
                        let _ = sink.close().await;
                        break ConnectionEnd::Shutdown;
                    }
                    Some(RelayCommand::Send(message)) => {
                        let text = match encode_relay(message) {
                            Ok(text) => text,
                            Err(e) => {
                                warn!(window = %label, error = %e, "failed to encode relay message");
                                continue;
                            }
                        };
                        if let Err(e) = sink.send(Message::Text(text.into())).await {
                            break ConnectionEnd::Lost(e.to_string());
                        }
                    }
                    Some(RelayCommand::Close) => {
                        let _ = sink.close().await;
                        break ConnectionEnd::Requested;
                    }
                    Some(RelayCommand::Open) => {}
                },
                frame = stream.next() => match frame {
                    None => break ConnectionEnd::Lost("closed by relay".to_string()),
                    Some(Err(e)) => break ConnectionEnd::Lost(e.to_string()),
                    Some(Ok(Message::Text(text))) => match decode_inbound(&text) {
                        Ok(inbound) => {
                            if report(&input_tx, RelayTransportEvent::Message(inbound)).await.is_err() {
                                let _ = sink.close().await;
                                break ConnectionEnd::Shutdown;
                            }
                        }
                        Err(e) => {
                            if should_log(&mut last_invalid_log) {
                                warn!(window = %label, error = %e, "ignoring relay message");
                            }
                        }
                    },
                    Some(Ok(Message::Close(_))) => break ConnectionEnd::Lost("closed by relay".to_string()),
                    Some(Ok(_)) => {}
                },
            }
        };

        match end {
            ConnectionEnd::Requested => info!(window = %label, "relay socket closed"),
            ConnectionEnd::Lost(reason) => {
                warn!(window = %label, %reason, "relay socket lost");
                if report(&input_tx, RelayTransportEvent::Closed { reason })
                    .await
                    .is_err()
                {
                    break;
                }
            }
            ConnectionEnd::Shutdown => break,
        }
    }
    debug!(window = %label, "relay transport exiting");
}

fn decode_inbound(text: &str) -> Result<RelayInbound, ProtocolError> {
    RelayInbound::try_from(decode_relay(text)?)
}

async fn report(
    input_tx: &mpsc::Sender<WindowInput>,
    event: RelayTransportEvent,
) -> Result<(), mpsc::error::SendError<WindowInput>> {
    input_tx.send(WindowInput::Relay(event)).await
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

    #[tokio::test]
    async fn when_relay_is_unreachable_then_open_reports_closed() {
        // Grab a free port and release it so nothing is listening there.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let (command_tx, command_rx) = mpsc::channel(4);
        let (input_tx, mut input_rx) = mpsc::channel(4);
        tokio::spawn(relay_transport(
            "w".to_string(),
            format!("ws://{addr}/ws"),
            command_rx,
            input_tx,
        ));

        command_tx.send(RelayCommand::Open).await.expect("send");
        let event = input_rx.recv().await.expect("event");
        assert!(matches!(
            event,
            WindowInput::Relay(RelayTransportEvent::Closed { .. })
        ));
    }
}
