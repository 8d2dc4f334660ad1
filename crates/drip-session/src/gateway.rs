//! WebSocket gateway transport.
//!
//! The platform is reached through a gateway that speaks newline-free JSON
//! frames over a WebSocket. Client frames:
//!
//! | Frame  | Fields               | Meaning                                |
//! |--------|----------------------|----------------------------------------|
//! | `init` | `credentials?`       | First frame; resume or start pairing   |
//! | `send` | `id`, `to`, `body`   | Deliver one text message               |
//!
//! Gateway frames: `qr {code}`, `open {credentials}`, `creds
//! {credentials}`, `ack {id}`, `nack {id, error}`, `close {reason}`.
//!
//! One task per connection owns both halves of the socket, matches acks to
//! pending sends by id, and forwards lifecycle frames as
//! [`TransportEvent`]s to the session manager.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use drip_core::state::{DisconnectReason, PairingCode};

use crate::store::Credentials;
use crate::transport::{Connection, SendCommand, Session, Transport, TransportError, TransportEvent};

/// Frames sent to the gateway.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame<'a> {
    Init {
        #[serde(skip_serializing_if = "Option::is_none")]
        credentials: Option<&'a Credentials>,
    },
    Send {
        id: u64,
        to: &'a str,
        body: &'a str,
    },
}

/// Frames received from the gateway.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum GatewayFrame {
    Qr { code: String },
    Open { credentials: Credentials },
    Creds { credentials: Credentials },
    Ack { id: u64 },
    Nack { id: u64, error: String },
    Close { reason: String },
}

/// Production transport over a platform gateway WebSocket.
#[derive(Clone, Debug)]
pub struct GatewayTransport {
    url: String,
}

impl GatewayTransport {
    /// Transport targeting the given `ws://` / `wss://` gateway URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Transport for GatewayTransport {
    async fn connect(&self, stored: Option<Credentials>) -> Result<Connection, TransportError> {
        let (mut ws, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let init = serde_json::to_string(&ClientFrame::Init {
            credentials: stored.as_ref(),
        })
        .map_err(|e| TransportError::Connect(e.to_string()))?;
        ws.send(Message::text(init))
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let (command_tx, command_rx) = mpsc::channel(32);
        let (event_tx, event_rx) = mpsc::channel(32);
        drop(tokio::spawn(run_connection(ws, command_rx, event_tx)));

        Ok(Connection {
            session: Session::new(command_tx),
            events: event_rx,
        })
    }
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Drive one gateway connection until it closes.
async fn run_connection(
    ws: WsStream,
    mut commands: mpsc::Receiver<SendCommand>,
    events: mpsc::Sender<TransportEvent>,
) {
    let (mut sink, mut stream) = ws.split();
    let mut pending: HashMap<u64, oneshot::Sender<Result<(), TransportError>>> = HashMap::new();
    let mut next_id: u64 = 0;
    let mut commands_open = true;

    let reason = loop {
        tokio::select! {
            cmd = commands.recv(), if commands_open => match cmd {
                Some(SendCommand { to, body, done }) => {
                    next_id += 1;
                    let frame = serde_json::to_string(&ClientFrame::Send {
                        id: next_id,
                        to: &to,
                        body: &body,
                    })
                    .expect("send frame always serializes");
                    if let Err(e) = sink.send(Message::text(frame)).await {
                        warn!(error = %e, "gateway write failed");
                        let _ = done.send(Err(TransportError::Closed));
                        break DisconnectReason::ConnectionLost;
                    }
                    let _ = pending.insert(next_id, done);
                }
                // All session handles dropped; keep reading lifecycle
                // frames until the socket closes.
                None => commands_open = false,
            },
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(raw))) => {
                    match serde_json::from_str::<GatewayFrame>(raw.as_str()) {
                        Ok(frame) => {
                            if let Some(reason) =
                                handle_frame(frame, &mut pending, &events).await
                            {
                                break reason;
                            }
                        }
                        Err(e) => warn!(error = %e, "unparseable gateway frame"),
                    }
                }
                // Pings are answered by tungstenite during reads.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "gateway read failed");
                    break DisconnectReason::ConnectionLost;
                }
                None => break DisconnectReason::ConnectionLost,
            },
        }
    };

    // Dropping the pending map fails outstanding sends with `Closed`.
    pending.clear();
    debug!(?reason, "gateway connection ended");
    let _ = events.send(TransportEvent::Closed { reason }).await;
}

/// Forward one gateway frame. Returns the close reason when terminal.
async fn handle_frame(
    frame: GatewayFrame,
    pending: &mut HashMap<u64, oneshot::Sender<Result<(), TransportError>>>,
    events: &mpsc::Sender<TransportEvent>,
) -> Option<DisconnectReason> {
    match frame {
        GatewayFrame::Qr { code } => {
            let _ = events
                .send(TransportEvent::Pairing {
                    code: PairingCode(code),
                })
                .await;
        }
        GatewayFrame::Open { credentials } => {
            let _ = events.send(TransportEvent::Open { credentials }).await;
        }
        GatewayFrame::Creds { credentials } => {
            let _ = events
                .send(TransportEvent::CredentialsUpdate { credentials })
                .await;
        }
        GatewayFrame::Ack { id } => match pending.remove(&id) {
            Some(done) => {
                let _ = done.send(Ok(()));
            }
            None => warn!(id, "ack for unknown send"),
        },
        GatewayFrame::Nack { id, error } => match pending.remove(&id) {
            Some(done) => {
                let _ = done.send(Err(TransportError::Rejected(error)));
            }
            None => warn!(id, "nack for unknown send"),
        },
        GatewayFrame::Close { reason } => {
            return Some(DisconnectReason::from_wire(&reason));
        }
    }
    None
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
