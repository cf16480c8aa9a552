//! HTTP handlers for the `/jam` resource and the liveness endpoints.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use rmx_core::errors::JamError;
use rmx_core::ids::RoomId;
use tracing::info;

use crate::error::ApiError;
use crate::health::{self, HealthResponse};
use crate::jam::{CreateJamRequest, CreatedJam, JamView};
use crate::server::AppState;

/// Resolve a requested capacity against the configured default.
fn resolve_capacity(requested: Option<i64>, default_capacity: usize) -> Result<usize, JamError> {
    match requested {
        None => Ok(default_capacity),
        Some(capacity) => usize::try_from(capacity)
            .ok()
            .filter(|c| *c > 0)
            .ok_or(JamError::InvalidCapacity { capacity }),
    }
}

/// `POST /jam`
pub async fn create_jam(
    State(state): State<AppState>,
    body: Result<Json<CreateJamRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let (jam, requested) = request.into_parts();
    let capacity = resolve_capacity(requested, state.default_capacity)?;

    let id = state.broker.create_room(capacity, jam)?;
    info!(room_id = %id, capacity, "jam created over http");
    let location = format!("/jam/{id}");
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(CreatedJam {
            id: id.into_inner(),
        }),
    )
        .into_response())
}

/// `GET /jam`
pub async fn list_jams(State(state): State<AppState>) -> Json<Vec<JamView>> {
    Json(state.broker.rooms().iter().map(JamView::from_room).collect())
}

/// `GET /jam/{id}`
pub async fn get_jam(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JamView>, ApiError> {
    let room = state.broker.get_room(&RoomId::from(id))?;
    Ok(Json(JamView::from_room(&room)))
}

/// `DELETE /jam/{id}`: close the room and all of its connections.
pub async fn delete_jam(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    let _ = state.broker.remove_room(&RoomId::from(id)).await;
    StatusCode::NO_CONTENT
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.broker.room_count(),
        state.broker.connection_count(),
    ))
}

/// `GET /ping`
pub async fn ping() -> &'static str {
    "pong"
}

/// `GET /metrics`
pub async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_capacity_uses_default() {
        assert_eq!(resolve_capacity(None, 2).unwrap(), 2);
    }

    #[test]
    fn positive_capacity_is_kept() {
        assert_eq!(resolve_capacity(Some(8), 2).unwrap(), 8);
    }

    #[test]
    fn non_positive_capacity_is_invalid() {
        assert!(matches!(
            resolve_capacity(Some(0), 2),
            Err(JamError::InvalidCapacity { capacity: 0 })
        ));
        assert!(matches!(
            resolve_capacity(Some(-3), 2),
            Err(JamError::InvalidCapacity { capacity: -3 })
        ));
    }
}
