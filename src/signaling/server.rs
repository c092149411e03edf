use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Bytes, Message};
use tracing::{debug, error, info, warn};

use super::actor::{CoordinatorHandle, SignalingCommand, coordinator_actor};
use super::messages::{ClientEvent, HandshakeKind, ServerEvent};
use super::types::{ConnectionId, OutboundMessage};

pub const DEFAULT_SIGNALING_PORT: u16 = 3000;
const PING_INTERVAL: Duration = Duration::from_secs(30);
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SignalingServer {
    handle: CoordinatorHandle,
}

impl Default for SignalingServer {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalingServer {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel::<SignalingCommand>(1024);
        tokio::spawn(coordinator_actor(rx));

        Self {
            handle: CoordinatorHandle { tx },
        }
    }

    /// Handle for reporting queries against the live coordinator state.
    pub fn handle(&self) -> CoordinatorHandle {
        self.handle.clone()
    }

    pub async fn run(&self, addr: &str) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!("Signaling server listening on {}", addr);

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

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    handle: CoordinatorHandle,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    let connection_id = ConnectionId::generate();
    info!("WebSocket connection {} from {}", connection_id, addr);

    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundMessage>();
    let (ctrl_tx, mut ctrl_rx) = mpsc::unbounded_channel::<Message>();

    handle.attach(connection_id, tx.clone()).await;

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
                    warn!("No Pong received, disconnecting {}", addr);
                    break;
                }
                if ctrl_tx.send(Message::Ping(Bytes::new())).is_err() {
                    break;
                }
                waiting_for_pong = true;
                pong_deadline = Some(tokio::time::Instant::now() + PONG_TIMEOUT);
                debug!("Ping sent to {}", addr);
            }

            _ = pong_timeout => {
                warn!("Pong timeout, disconnecting {}", addr);
                break;
            }

            msg = ws_rx.next() => {
                let msg = match msg {
                    Some(Ok(m)) => m,
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                };

                match msg {
                    Message::Text(text) => {
                        handle_client_event(&text, connection_id, &tx, &handle).await;
                    }
                    Message::Pong(_) => {
                        waiting_for_pong = false;
                        pong_deadline = None;
                        debug!("Pong received from {}", addr);
                    }
                    Message::Close(_) => {
                        info!("Close received from {}", addr);
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    handle.detach(connection_id).await;

    send_task.abort();
    info!("WebSocket disconnected: {} ({})", connection_id, addr);

    Ok(())
}

async fn handle_client_event(
    text: &str,
    connection_id: ConnectionId,
    tx: &mpsc::UnboundedSender<OutboundMessage>,
    handle: &CoordinatorHandle,
) {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(e) => e,
        Err(e) => {
            let err = ServerEvent::Error {
                message: format!("Invalid message: {}", e),
            };
            let _ = tx.send(err.to_message());
            return;
        }
    };

    match event {
        ClientEvent::Join(data) => handle.join(connection_id, data).await,
        ClientEvent::WebcamToggle(data) => handle.toggle_webcam(connection_id, data).await,
        ClientEvent::VideoFrame(data) => handle.relay_frame(connection_id, data).await,
        ClientEvent::Offer(data) => {
            handle
                .relay_handshake(HandshakeKind::Offer, connection_id, data)
                .await
        }
        ClientEvent::Answer(data) => {
            handle
                .relay_handshake(HandshakeKind::Answer, connection_id, data)
                .await
        }
        ClientEvent::IceCandidate(data) => {
            handle
                .relay_handshake(HandshakeKind::IceCandidate, connection_id, data)
                .await
        }
    }
}
