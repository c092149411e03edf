use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use super::messages::{
    FramePayload, HandshakeKind, HandshakePayload, JoinPayload, ServerEvent, WebcamTogglePayload,
    decode_payload,
};
use super::registry::ParticipantRegistry;
use super::rooms::RoomDirectory;
use super::types::{
    ConnectionId, CoreStats, DEFAULT_ROOM, OutboundMessage, Participant, RoomInfo, SignalingError,
};

/// A connection is either unregistered (join not yet completed) or registered
/// as a participant. Frame and handshake relay drop silently in the first
/// case; join is the only transition in, leave/disconnect the only one out.
enum Registration<'a> {
    Unregistered,
    Registered(&'a Participant),
}

/// Protocol-level request handling, validation, and broadcast/unicast relay.
///
/// Owns the participant registry, the room directory, and the outbound
/// sender of every live connection. All methods are synchronous; the owning
/// actor task processes one event to completion before the next, which makes
/// each of them atomic with respect to concurrent connections.
pub struct SignalingCoordinator {
    registry: ParticipantRegistry,
    rooms: RoomDirectory,
    links: HashMap<ConnectionId, mpsc::UnboundedSender<OutboundMessage>>,
}

impl Default for SignalingCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalingCoordinator {
    pub fn new() -> Self {
        Self {
            registry: ParticipantRegistry::new(),
            rooms: RoomDirectory::new(),
            links: HashMap::new(),
        }
    }

    /// Register a connection's outbound channel. Called by the transport at
    /// accept time, before any protocol event from that connection.
    pub fn attach(&mut self, connection_id: ConnectionId, tx: mpsc::UnboundedSender<OutboundMessage>) {
        self.links.insert(connection_id, tx);
    }

    /// Disconnect teardown: leave whatever room the connection occupied and
    /// drop its sender. Always succeeds or no-ops.
    pub fn detach(&mut self, connection_id: ConnectionId) {
        self.leave(connection_id);
        self.links.remove(&connection_id);
    }

    /// Handle a join request: validate, register, reply privately with the
    /// room snapshot, then announce to the other members.
    pub fn join(&mut self, connection_id: ConnectionId, data: Value) {
        let payload: JoinPayload = match decode_payload(data) {
            Ok(p) => p,
            Err(e) => {
                warn!("Rejected join from {}: {}", connection_id, e);
                self.notify_error(connection_id, &e);
                return;
            }
        };

        let (Some(external_id), Some(display_name)) = (payload.external_id, payload.display_name)
        else {
            let err = SignalingError::MissingField("externalId or displayName");
            warn!("Rejected join from {}: {}", connection_id, err);
            self.notify_error(connection_id, &err);
            return;
        };

        let room_id = payload
            .room_id
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_ROOM.to_string());

        let participant = self
            .registry
            .add(connection_id, external_id, display_name, room_id.clone());
        self.rooms.add_member(&room_id, connection_id);

        // snapshot of the members present before this join
        let existing_members: Vec<Participant> = self
            .rooms
            .members_of(&room_id)
            .into_iter()
            .filter(|&member| member != connection_id)
            .filter_map(|member| self.registry.get(member).cloned())
            .collect();

        info!(
            "Participant {} joined room {} ({} present)",
            participant.display_name,
            room_id,
            existing_members.len() + 1
        );

        // private reply first, then the announcement to everyone else
        self.send_to(
            connection_id,
            &ServerEvent::Joined {
                own: participant.clone(),
                existing_members,
            },
        );
        self.broadcast(
            &room_id,
            Some(connection_id),
            &ServerEvent::ParticipantNew { participant },
        );
    }

    /// Handle departure (disconnect or explicit): announce to the remaining
    /// members, then drop membership and the participant record.
    fn leave(&mut self, connection_id: ConnectionId) {
        let Some(participant) = self.registry.remove(connection_id) else {
            return;
        };

        if let Some(room_id) = self.rooms.room_of(connection_id).map(str::to_owned) {
            self.broadcast(
                &room_id,
                Some(connection_id),
                &ServerEvent::ParticipantLeft {
                    external_id: participant.external_id.clone(),
                    display_name: participant.display_name.clone(),
                },
            );
        }
        self.rooms.remove_member(connection_id);

        info!("Participant {} left", participant.display_name);
    }

    /// Update the webcam flag and broadcast the status to the whole room,
    /// the sender included.
    pub fn toggle_webcam(&mut self, connection_id: ConnectionId, data: Value) {
        let payload: WebcamTogglePayload = match decode_payload(data) {
            Ok(p) => p,
            Err(e) => {
                warn!("Rejected webcam toggle from {}: {}", connection_id, e);
                self.notify_error(connection_id, &e);
                return;
            }
        };

        self.registry.set_webcam_active(connection_id, payload.active);

        match self.registration(connection_id) {
            Registration::Unregistered => {}
            Registration::Registered(participant) => {
                info!(
                    "Participant {} webcam {}",
                    participant.display_name,
                    if payload.active { "on" } else { "off" }
                );
                let event = ServerEvent::WebcamStatus {
                    external_id: participant.external_id.clone(),
                    display_name: participant.display_name.clone(),
                    active: payload.active,
                };
                if let Some(room_id) = self.rooms.room_of(connection_id) {
                    self.broadcast(room_id, None, &event);
                }
            }
        }
    }

    /// Fan an opaque frame out to the other room members. Frames from
    /// unregistered connections arrive during the join handshake window and
    /// are dropped without an error.
    pub fn relay_frame(&mut self, connection_id: ConnectionId, data: Value) {
        let payload: FramePayload = match decode_payload(data) {
            Ok(p) => p,
            Err(e) => {
                debug!("Dropping frame from {}: {}", connection_id, e);
                return;
            }
        };

        match self.registration(connection_id) {
            Registration::Unregistered => {
                trace!("Dropping frame from unregistered connection {}", connection_id);
            }
            Registration::Registered(participant) => {
                let event = ServerEvent::VideoFrame {
                    from_external_id: participant.external_id.clone(),
                    from_display_name: participant.display_name.clone(),
                    frame_data: payload.frame_data,
                };
                if let Some(room_id) = self.rooms.room_of(connection_id) {
                    self.broadcast(room_id, Some(connection_id), &event);
                }
            }
        }
    }

    /// Unicast a handshake message to the participant currently holding the
    /// target external id. Unresolved sender or target drops the message.
    pub fn relay_handshake(&mut self, kind: HandshakeKind, connection_id: ConnectionId, data: Value) {
        let payload: HandshakePayload = match decode_payload(data) {
            Ok(p) => p,
            Err(e) => {
                debug!("Dropping {} from {}: {}", kind, connection_id, e);
                return;
            }
        };

        let Registration::Registered(sender) = self.registration(connection_id) else {
            warn!("Dropping {}: sender {} not registered", kind, connection_id);
            return;
        };
        let Some(target) = self.registry.get_by_external_id(&payload.target_external_id) else {
            warn!(
                "Dropping {} from {}: unknown target {}",
                kind, sender.display_name, payload.target_external_id
            );
            return;
        };

        let event = match kind {
            HandshakeKind::Offer => ServerEvent::Offer {
                from_external_id: sender.external_id.clone(),
                from_display_name: sender.display_name.clone(),
                payload: payload.payload,
            },
            HandshakeKind::Answer => ServerEvent::Answer {
                from_external_id: sender.external_id.clone(),
                from_display_name: sender.display_name.clone(),
                payload: payload.payload,
            },
            HandshakeKind::IceCandidate => ServerEvent::IceCandidate {
                from_external_id: sender.external_id.clone(),
                payload: payload.payload,
            },
        };

        debug!(
            "Forwarded {} from {} to {}",
            kind, sender.display_name, target.display_name
        );
        self.send_to(target.connection_id, &event);
    }

    /// Reporting snapshot of all rooms.
    pub fn list_rooms(&self) -> Vec<RoomInfo> {
        self.rooms.list_rooms()
    }

    /// Reporting snapshot of one room's participants.
    pub fn room_participants(&self, room_id: &str) -> Vec<Participant> {
        self.registry
            .list_in_room(room_id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> CoreStats {
        CoreStats {
            participants: self.registry.list_all().len(),
            rooms: self.rooms.len(),
        }
    }

    fn registration(&self, connection_id: ConnectionId) -> Registration<'_> {
        match self.registry.get(connection_id) {
            Some(participant) => Registration::Registered(participant),
            None => Registration::Unregistered,
        }
    }

    fn notify_error(&self, connection_id: ConnectionId, err: &SignalingError) {
        self.send_to(connection_id, &ServerEvent::error(err));
    }

    fn send_to(&self, connection_id: ConnectionId, event: &ServerEvent) {
        if let Some(tx) = self.links.get(&connection_id) {
            let _ = tx.send(event.to_message());
        }
    }

    /// Serialize once, then fan out; the outbound handle clones in O(1).
    fn broadcast(&self, room_id: &str, skip: Option<ConnectionId>, event: &ServerEvent) {
        let msg = event.to_message();
        for member in self.rooms.members_of(room_id) {
            if Some(member) == skip {
                continue;
            }
            if let Some(tx) = self.links.get(&member) {
                let _ = tx.send(msg.clone());
            }
        }
    }
}
