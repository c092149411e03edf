//! WebSocket presence and relay core for multi-party webcam broadcast

mod actor;
mod coordinator;
mod messages;
mod registry;
mod rooms;
mod server;
mod types;

pub use actor::CoordinatorHandle;
pub use coordinator::SignalingCoordinator;
pub use messages::{ClientEvent, HandshakeKind, ServerEvent};
pub use server::{DEFAULT_SIGNALING_PORT, SignalingServer};
pub use types::{
    ConnectionId, CoreStats, DEFAULT_ROOM, OutboundMessage, Participant, RoomInfo, SignalingError,
};
