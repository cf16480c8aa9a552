//! `WebSocket` entry point for a jam room.
//!
//! Admission is decided before the upgrade: a missing room answers 404 and a
//! full or closed room answers 503/410 over plain HTTP, so a rejected client
//! never sees an upgraded-then-dropped socket. The room re-checks capacity
//! atomically when the upgraded socket is admitted.

use std::sync::Arc;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use metrics::counter;
use rmx_broker::telemetry::ADMISSIONS_REJECTED_TOTAL;
use rmx_core::errors::JamError;
use rmx_core::ids::RoomId;
use tracing::{debug, instrument, warn};

use super::transport::{WsSink, WsSource};
use crate::error::ApiError;
use crate::jam::{JamRoom, Participant};
use crate::server::AppState;

/// `GET /ws/jam/{id}`: check admission, then upgrade and admit.
pub async fn jam_ws_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    let room = state.broker.get_room(&RoomId::from(id))?;
    if let Err(e) = room.check_admission() {
        counter!(ADMISSIONS_REJECTED_TOTAL).increment(1);
        return Err(e.into());
    }

    let participant = state.resolver.resolve(&headers).await?;
    let upgrade = upgrade.map_err(|e| JamError::UpgradeFailed(e.body_text()))?;

    Ok(upgrade
        .max_message_size(state.max_message_size)
        .on_upgrade(move |socket| run_ws_session(socket, room, participant))
        .into_response())
}

/// Admit an upgraded socket into `room`.
///
/// On success the connection's read pump owns the socket from here on. If
/// the room filled up between the pre-check and now, the socket is closed.
#[instrument(skip_all, fields(room_id = %room.id(), user_id = %participant.id))]
pub async fn run_ws_session(socket: WebSocket, room: Arc<JamRoom>, participant: Participant) {
    let (sink, source) = socket.split();
    match room
        .admit(
            participant,
            Box::new(WsSink::new(sink)),
            Box::new(WsSource::new(source)),
        )
        .await
    {
        Ok(conn) => debug!(conn_id = %conn.id(), "websocket admitted"),
        Err(e) => warn!(error = %e, "admission refused after upgrade"),
    }
}
