//! Visage: a presence-and-relay core for multi-party webcam broadcast.
//!
//! Clients connect over WebSocket, declare identity and a room, and the
//! server tracks who is present where, whether each camera is on, and relays
//! opaque video frames and WebRTC handshake messages among room members. A
//! small read-only HTTP surface reports rooms and participants.

pub mod reporting;
pub mod signaling;
