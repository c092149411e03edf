//! Read-only HTTP reporting surface: point-in-time snapshots of the
//! coordinator's rooms and participants. Consumes core state, never
//! mutates it.

use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::signaling::{CoordinatorHandle, Participant, RoomInfo, SignalingError};

pub const DEFAULT_HTTP_PORT: u16 = 3001;

#[derive(Clone)]
struct ReportingState {
    handle: CoordinatorHandle,
    started: Instant,
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    uptime: u64,
    participants: usize,
    rooms: usize,
}

#[derive(Serialize)]
struct RoomsBody {
    rooms: Vec<RoomInfo>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RoomParticipantsBody {
    room_id: String,
    participants: Vec<ParticipantSummary>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ParticipantSummary {
    external_id: String,
    display_name: String,
    webcam_active: bool,
    connected_at: u64,
}

impl From<Participant> for ParticipantSummary {
    fn from(p: Participant) -> Self {
        Self {
            external_id: p.external_id,
            display_name: p.display_name,
            webcam_active: p.webcam_active,
            connected_at: p.connected_at,
        }
    }
}

pub fn router(handle: CoordinatorHandle) -> Router {
    let state = ReportingState {
        handle,
        started: Instant::now(),
    };
    Router::new()
        .route("/api/health", get(health))
        .route("/api/rooms", get(rooms))
        .route("/api/rooms/{room_id}/participants", get(room_participants))
        .with_state(state)
}

pub async fn serve(addr: &str, handle: CoordinatorHandle) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Reporting API listening on {}", addr);
    axum::serve(listener, router(handle)).await
}

async fn health(State(state): State<ReportingState>) -> Response {
    match state.handle.stats().await {
        Ok(stats) => Json(HealthBody {
            status: "ok",
            uptime: state.started.elapsed().as_secs(),
            participants: stats.participants,
            rooms: stats.rooms,
        })
        .into_response(),
        Err(e) => internal_error(e),
    }
}

async fn rooms(State(state): State<ReportingState>) -> Response {
    match state.handle.list_rooms().await {
        Ok(rooms) => Json(RoomsBody { rooms }).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn room_participants(
    Path(room_id): Path<String>,
    State(state): State<ReportingState>,
) -> Response {
    match state.handle.room_participants(room_id.clone()).await {
        Ok(participants) => Json(RoomParticipantsBody {
            room_id,
            participants: participants.into_iter().map(Into::into).collect(),
        })
        .into_response(),
        Err(e) => internal_error(e),
    }
}

fn internal_error(e: SignalingError) -> Response {
    error!("Reporting query failed: {}", e);
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}
