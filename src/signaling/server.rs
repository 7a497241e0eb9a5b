use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Bytes, Message};
use tracing::{debug, error, info, warn};

use super::actor::{RelayCommand, RelayHandle, relay_actor};
use super::messages::{ClientMessage, ServerMessage};
use super::types::{OutboundMessage, ParticipantId, SignalKind};

pub const DEFAULT_PORT: u16 = 3000;
const PING_INTERVAL: Duration = Duration::from_secs(30);
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SignalingServer {
    handle: RelayHandle,
}

impl Default for SignalingServer {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalingServer {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<RelayCommand>();
        tokio::spawn(relay_actor(rx));

        Self {
            handle: RelayHandle { tx },
        }
    }

    pub async fn run(&self, addr: &str) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!("Signaling relay listening on {}", addr);

        loop {
            let (stream, addr) = listener.accept().await?;
            let handle = self.handle.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, handle).await {
                    error!("Connection error from {}: {}", addr, e);
                }
            });
        }
    }
}

/// Scoped disconnect: dropping the guard submits the disconnect command,
/// so it reaches the relay on every exit path of a connection task (close
/// frame, read error, heartbeat expiry, panic unwinding).
struct ConnectionGuard {
    handle: RelayHandle,
    id: ParticipantId,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.handle.disconnect(self.id);
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    handle: RelayHandle,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    let id = ParticipantId::generate();
    info!("Participant {} connected from {}", id, addr);

    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundMessage>();
    let (ctrl_tx, mut ctrl_rx) = mpsc::unbounded_channel::<Message>();

    handle.connect(id, tx.clone());
    let _guard = ConnectionGuard {
        handle: handle.clone(),
        id,
    };

    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    let mut waiting_for_pong = false;
    let mut pong_deadline: Option<tokio::time::Instant> = None;

    let send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(msg) = rx.recv() => {
                    let ws_msg = Message::Text(msg.into_inner());
                    if ws_tx.send(ws_msg).await.is_err() {
                        break;
                    }
                }
                Some(ctrl_msg) = ctrl_rx.recv() => {
                    if ws_tx.send(ctrl_msg).await.is_err() {
                        break;
                    }
                }
                else => break,
            }
        }
    });

    loop {
        let pong_timeout = async {
            match pong_deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = ping_interval.tick() => {
                if waiting_for_pong {
                    warn!("No Pong received, disconnecting {}", id);
                    break;
                }
                if ctrl_tx.send(Message::Ping(Bytes::new())).is_err() {
                    break;
                }
                waiting_for_pong = true;
                pong_deadline = Some(tokio::time::Instant::now() + PONG_TIMEOUT);
                debug!("Ping sent to {}", id);
            }

            _ = pong_timeout => {
                warn!("Pong timeout, disconnecting {}", id);
                break;
            }

            msg = ws_rx.next() => {
                let msg = match msg {
                    Some(Ok(m)) => m,
                    Some(Err(e)) => {
                        warn!("WebSocket error from {}: {}", id, e);
                        break;
                    }
                    None => break,
                };

                match msg {
                    Message::Text(text) => handle_text_message(&text, &tx, &handle, id),
                    Message::Pong(_) => {
                        waiting_for_pong = false;
                        pong_deadline = None;
                        debug!("Pong received from {}", id);
                    }
                    Message::Close(_) => {
                        info!("Close received from {}", id);
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    send_task.abort();
    info!("Participant {} disconnected", id);

    Ok(())
}

/// Dispatch one inbound text frame.
///
/// A malformed frame never tears the connection down: the sender gets an
/// `error` reply on its own channel and nothing reaches the relay.
fn handle_text_message(
    text: &str,
    tx: &mpsc::UnboundedSender<OutboundMessage>,
    handle: &RelayHandle,
    id: ParticipantId,
) {
    let client_msg = match ClientMessage::parse(text) {
        Ok(m) => m,
        Err(e) => {
            warn!("Malformed message from {}: {}", id, e);
            let err = ServerMessage::Error {
                message: e.to_string(),
            };
            let _ = tx.send(err.to_outbound());
            return;
        }
    };

    match client_msg {
        ClientMessage::JoinRoom { room } => handle.join(id, room),
        ClientMessage::Offer { room, payload } => {
            handle.signal(id, room, SignalKind::Offer, payload)
        }
        ClientMessage::Answer { room, payload } => {
            handle.signal(id, room, SignalKind::Answer, payload)
        }
        ClientMessage::IceCandidate { room, payload } => {
            handle.signal(id, room, SignalKind::IceCandidate, payload)
        }
    }
}
