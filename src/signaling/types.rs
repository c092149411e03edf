use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tokio_tungstenite::tungstenite::Utf8Bytes;

/// Room used when a join payload omits the room id or leaves it empty.
pub const DEFAULT_ROOM: &str = "default";

/// Signaling errors surfaced to clients or reporting callers
#[derive(Debug, Error)]
pub enum SignalingError {
    #[error("missing {0}")]
    MissingField(&'static str),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("internal error: {0}")]
    Internal(String),
}

const CONNECTION_ID_LEN: usize = 13;
const HEX_CHARS: &[u8] = b"0123456789abcdef";

/// Connection ID: 13-byte fixed array ("conn_" + 8 hex), assigned by the
/// transport at accept time; not stable across reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId {
    bytes: [u8; CONNECTION_ID_LEN],
    len: u8,
}

impl ConnectionId {
    pub fn generate() -> Self {
        let mut bytes = [0u8; CONNECTION_ID_LEN];
        bytes[..5].copy_from_slice(b"conn_");

        let mut rng = rand::rng();
        let value: u32 = rng.random();

        for i in 0..8 {
            let nibble = ((value >> (28 - i * 4)) & 0xF) as usize;
            bytes[5 + i] = HEX_CHARS[nibble];
        }
        Self {
            bytes,
            len: CONNECTION_ID_LEN as u8,
        }
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        let mut bytes = [0u8; CONNECTION_ID_LEN];
        let src = s.as_bytes();
        let len = src.len().min(CONNECTION_ID_LEN);
        bytes[..len].copy_from_slice(&src[..len]);
        Self {
            bytes,
            len: len as u8,
        }
    }
}

impl Serialize for ConnectionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ConnectionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <&str>::deserialize(deserializer)?;
        Ok(ConnectionId::from(s))
    }
}

/// State record for one currently-joined connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub connection_id: ConnectionId,
    pub external_id: String,
    pub display_name: String,
    pub room_id: String,
    pub webcam_active: bool,
    pub connected_at: u64,
}

/// Reporting snapshot of one room.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub id: String,
    pub member_count: usize,
    pub created_at: u64,
}

/// Participant and room counts for the health snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoreStats {
    pub participants: usize,
    pub rooms: usize,
}

/// Milliseconds since the unix epoch.
pub(crate) fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Wrapper for outbound WebSocket messages using tungstenite's Utf8Bytes.
#[derive(Debug, Clone)]
pub struct OutboundMessage(Utf8Bytes);

impl OutboundMessage {
    /// Create a new outbound message from any string type
    pub fn new(s: impl Into<Utf8Bytes>) -> Self {
        Self(s.into())
    }

    /// Get the inner Utf8Bytes for tungstenite Message::Text
    pub fn into_inner(self) -> Utf8Bytes {
        self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<String> for OutboundMessage {
    fn from(s: String) -> Self {
        Self(Utf8Bytes::from(s))
    }
}
