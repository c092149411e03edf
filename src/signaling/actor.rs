use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use super::coordinator::SignalingCoordinator;
use super::messages::HandshakeKind;
use super::types::{
    ConnectionId, CoreStats, OutboundMessage, Participant, RoomInfo, SignalingError,
};

/// Commands sent to the coordinator actor
pub(crate) enum SignalingCommand {
    Attach {
        connection_id: ConnectionId,
        tx: mpsc::UnboundedSender<OutboundMessage>,
    },
    Join {
        connection_id: ConnectionId,
        data: Value,
    },
    ToggleWebcam {
        connection_id: ConnectionId,
        data: Value,
    },
    RelayFrame {
        connection_id: ConnectionId,
        data: Value,
    },
    RelayHandshake {
        kind: HandshakeKind,
        connection_id: ConnectionId,
        data: Value,
    },
    Detach {
        connection_id: ConnectionId,
    },
    ListRooms {
        reply: oneshot::Sender<Vec<RoomInfo>>,
    },
    RoomParticipants {
        room_id: String,
        reply: oneshot::Sender<Vec<Participant>>,
    },
    Stats {
        reply: oneshot::Sender<CoreStats>,
    },
}

/// Single owner of the registry, directory, and connection senders. Commands
/// are processed one at a time to completion, so every coordinator operation
/// is atomic with respect to concurrent connection handlers.
pub(crate) async fn coordinator_actor(mut rx: mpsc::Receiver<SignalingCommand>) {
    let mut coordinator = SignalingCoordinator::new();

    while let Some(cmd) = rx.recv().await {
        match cmd {
            SignalingCommand::Attach { connection_id, tx } => {
                coordinator.attach(connection_id, tx);
            }
            SignalingCommand::Join {
                connection_id,
                data,
            } => {
                coordinator.join(connection_id, data);
            }
            SignalingCommand::ToggleWebcam {
                connection_id,
                data,
            } => {
                coordinator.toggle_webcam(connection_id, data);
            }
            SignalingCommand::RelayFrame {
                connection_id,
                data,
            } => {
                coordinator.relay_frame(connection_id, data);
            }
            SignalingCommand::RelayHandshake {
                kind,
                connection_id,
                data,
            } => {
                coordinator.relay_handshake(kind, connection_id, data);
            }
            SignalingCommand::Detach { connection_id } => {
                coordinator.detach(connection_id);
            }
            SignalingCommand::ListRooms { reply } => {
                let _ = reply.send(coordinator.list_rooms());
            }
            SignalingCommand::RoomParticipants { room_id, reply } => {
                let _ = reply.send(coordinator.room_participants(&room_id));
            }
            SignalingCommand::Stats { reply } => {
                let _ = reply.send(coordinator.stats());
            }
        }
    }
}

/// Handle to communicate with the coordinator actor
#[derive(Clone)]
pub struct CoordinatorHandle {
    pub(crate) tx: mpsc::Sender<SignalingCommand>,
}

impl CoordinatorHandle {
    /// Register a connection's outbound channel before any protocol event.
    pub async fn attach(
        &self,
        connection_id: ConnectionId,
        tx: mpsc::UnboundedSender<OutboundMessage>,
    ) {
        let _ = self
            .tx
            .send(SignalingCommand::Attach { connection_id, tx })
            .await;
    }

    pub async fn join(&self, connection_id: ConnectionId, data: Value) {
        let _ = self
            .tx
            .send(SignalingCommand::Join {
                connection_id,
                data,
            })
            .await;
    }

    pub async fn toggle_webcam(&self, connection_id: ConnectionId, data: Value) {
        let _ = self
            .tx
            .send(SignalingCommand::ToggleWebcam {
                connection_id,
                data,
            })
            .await;
    }

    pub async fn relay_frame(&self, connection_id: ConnectionId, data: Value) {
        let _ = self
            .tx
            .send(SignalingCommand::RelayFrame {
                connection_id,
                data,
            })
            .await;
    }

    pub async fn relay_handshake(
        &self,
        kind: HandshakeKind,
        connection_id: ConnectionId,
        data: Value,
    ) {
        let _ = self
            .tx
            .send(SignalingCommand::RelayHandshake {
                kind,
                connection_id,
                data,
            })
            .await;
    }

    /// Disconnect teardown; triggers leave for a registered connection.
    pub async fn detach(&self, connection_id: ConnectionId) {
        let _ = self
            .tx
            .send(SignalingCommand::Detach { connection_id })
            .await;
    }

    /// Point-in-time snapshot of all rooms, for the reporting surface.
    pub async fn list_rooms(&self) -> Result<Vec<RoomInfo>, SignalingError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let _ = self
            .tx
            .send(SignalingCommand::ListRooms { reply: reply_tx })
            .await;
        reply_rx
            .await
            .map_err(|_| SignalingError::Internal("actor channel closed".to_string()))
    }

    /// Point-in-time snapshot of one room's participants.
    pub async fn room_participants(
        &self,
        room_id: String,
    ) -> Result<Vec<Participant>, SignalingError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let _ = self
            .tx
            .send(SignalingCommand::RoomParticipants {
                room_id,
                reply: reply_tx,
            })
            .await;
        reply_rx
            .await
            .map_err(|_| SignalingError::Internal("actor channel closed".to_string()))
    }

    pub async fn stats(&self) -> Result<CoreStats, SignalingError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let _ = self
            .tx
            .send(SignalingCommand::Stats { reply: reply_tx })
            .await;
        reply_rx
            .await
            .map_err(|_| SignalingError::Internal("actor channel closed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signaling::messages::ServerEvent;
    use serde_json::json;

    #[tokio::test]
    async fn commands_round_trip_through_the_actor() {
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(coordinator_actor(rx));
        let handle = CoordinatorHandle { tx };

        let conn = ConnectionId::generate();
        let (peer_tx, mut peer_rx) = mpsc::unbounded_channel();
        handle.attach(conn, peer_tx).await;
        handle
            .join(
                conn,
                json!({"externalId": "u1", "displayName": "Alex", "roomId": "lobby"}),
            )
            .await;

        let msg = peer_rx.recv().await.expect("joined reply");
        let event: ServerEvent = serde_json::from_str(msg.as_str()).unwrap();
        assert!(matches!(event, ServerEvent::Joined { .. }));

        let rooms = handle.list_rooms().await.unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].id, "lobby");

        let participants = handle.room_participants("lobby".to_string()).await.unwrap();
        assert_eq!(participants.len(), 1);
        assert_eq!(participants[0].external_id, "u1");

        let stats = handle.stats().await.unwrap();
        assert_eq!(stats.participants, 1);
        assert_eq!(stats.rooms, 1);

        handle.detach(conn).await;
        let stats = handle.stats().await.unwrap();
        assert_eq!(stats.participants, 0);
        assert_eq!(stats.rooms, 0);
    }
}
