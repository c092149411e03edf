use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{OutboundMessage, Participant, SignalingError};

/// Events sent from client to server. The envelope is
/// `{"event": <name>, "data": <payload>}`; payloads stay opaque here because
/// clients send them either as structured JSON or as a JSON-encoded string
/// (see [`decode_payload`]).
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Declare identity and enter a room
    #[serde(rename = "join")]
    Join(Value),

    /// Turn the sender's camera flag on or off
    #[serde(rename = "webcam:toggle")]
    WebcamToggle(Value),

    /// Opaque video frame for the sender's room
    #[serde(rename = "video:frame")]
    VideoFrame(Value),

    #[serde(rename = "handshake:offer")]
    Offer(Value),

    #[serde(rename = "handshake:answer")]
    Answer(Value),

    #[serde(rename = "handshake:ice-candidate")]
    IceCandidate(Value),
}

/// The three identity-targeted handshake message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeKind {
    Offer,
    Answer,
    IceCandidate,
}

impl fmt::Display for HandshakeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HandshakeKind::Offer => "offer",
            HandshakeKind::Answer => "answer",
            HandshakeKind::IceCandidate => "ice-candidate",
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPayload {
    pub external_id: Option<String>,
    pub display_name: Option<String>,
    pub room_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WebcamTogglePayload {
    pub active: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FramePayload {
    pub frame_data: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakePayload {
    pub target_external_id: String,
    pub payload: Value,
}

/// Decode an event payload that may arrive as a structured value or as a
/// wire-level JSON string carrying the same structure.
pub fn decode_payload<T: DeserializeOwned>(data: Value) -> Result<T, SignalingError> {
    let result = match data {
        Value::String(text) => serde_json::from_str(&text),
        other => serde_json::from_value(other),
    };
    result.map_err(|e| SignalingError::MalformedPayload(e.to_string()))
}

/// Events sent from server to client
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Private reply to the joiner: own record plus the members already in
    /// the room at this instant
    #[serde(rename = "joined", rename_all = "camelCase")]
    Joined {
        #[serde(rename = "self")]
        own: Participant,
        existing_members: Vec<Participant>,
    },

    /// Broadcast to the other room members when someone joins
    #[serde(rename = "participant:new")]
    ParticipantNew { participant: Participant },

    /// Broadcast to the remaining room members when someone leaves
    #[serde(rename = "participant:left", rename_all = "camelCase")]
    ParticipantLeft {
        external_id: String,
        display_name: String,
    },

    /// Full-room broadcast, sender included
    #[serde(rename = "webcam:status", rename_all = "camelCase")]
    WebcamStatus {
        external_id: String,
        display_name: String,
        active: bool,
    },

    /// Frame fan-out to the other room members
    #[serde(rename = "video:frame", rename_all = "camelCase")]
    VideoFrame {
        from_external_id: String,
        from_display_name: String,
        frame_data: Value,
    },

    #[serde(rename = "handshake:offer", rename_all = "camelCase")]
    Offer {
        from_external_id: String,
        from_display_name: String,
        payload: Value,
    },

    #[serde(rename = "handshake:answer", rename_all = "camelCase")]
    Answer {
        from_external_id: String,
        from_display_name: String,
        payload: Value,
    },

    #[serde(rename = "handshake:ice-candidate", rename_all = "camelCase")]
    IceCandidate {
        from_external_id: String,
        payload: Value,
    },

    /// Sent only for join/toggle validation and parse failures
    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerEvent {
    pub fn error(err: &SignalingError) -> Self {
        ServerEvent::Error {
            message: err.to_string(),
        }
    }

    /// Serialize once for fan-out; the resulting message clones in O(1).
    pub fn to_message(&self) -> OutboundMessage {
        let json = serde_json::to_string(self).expect("ServerEvent serialization should never fail");
        OutboundMessage::from(json)
    }
}
