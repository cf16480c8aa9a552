//! HTTP error mapping.
//!
//! Every failure leaves the server as `{"error": {"code": .., "message": ..}}`
//! with a status chosen from the broker error it wraps.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rmx_core::errors::JamError;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

/// Error body returned by every endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Wrapped error detail.
    pub error: ErrorBody,
}

/// Machine-readable code plus human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Stable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl ErrorResponse {
    /// Build an error body.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}

/// Application error that converts to an HTTP response.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A broker failure.
    #[error(transparent)]
    Jam(#[from] JamError),
    /// The request was malformed before it reached the broker.
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Jam(JamError::InvalidCapacity { .. }) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Jam(JamError::RoomNotFound(_)) => StatusCode::NOT_FOUND,
            Self::Jam(
                JamError::RoomFull { .. } | JamError::TooManyRooms { .. } | JamError::ShuttingDown,
            ) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Jam(JamError::RoomClosed(_)) => StatusCode::GONE,
            Self::Jam(JamError::UpgradeFailed(_)) => StatusCode::UPGRADE_REQUIRED,
            Self::Jam(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable error code for the response body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Jam(e) => e.code(),
            Self::BadRequest(_) => "BAD_REQUEST",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            error!(code = self.code(), error = %self, "request failed");
        } else {
            debug!(code = self.code(), error = %self, "request rejected");
        }
        let body = Json(ErrorResponse::new(self.code(), self.to_string()));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmx_core::ids::{ConnectionId, RoomId};

    #[test]
    fn statuses_follow_error_kind() {
        let cases = [
            (JamError::invalid_capacity(0), StatusCode::BAD_REQUEST),
            (JamError::RoomNotFound(RoomId::from("r")), StatusCode::NOT_FOUND),
            (
                JamError::RoomFull {
                    room_id: RoomId::from("r"),
                    capacity: 2,
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (JamError::RoomClosed(RoomId::from("r")), StatusCode::GONE),
            (
                JamError::TooManyRooms { max_rooms: 1 },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (JamError::ShuttingDown, StatusCode::SERVICE_UNAVAILABLE),
            (
                JamError::UpgradeFailed("no upgrade header".into()),
                StatusCode::UPGRADE_REQUIRED,
            ),
            (
                JamError::ConnectionClosed(ConnectionId::from("c")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[tokio::test]
    async fn body_carries_code_and_message() {
        let resp = ApiError::from(JamError::RoomNotFound(RoomId::from("abc"))).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["error"]["code"], "ROOM_NOT_FOUND");
        assert_eq!(parsed["error"]["message"], "room not found: abc");
    }

    #[test]
    fn bad_request_code() {
        let err = ApiError::BadRequest("missing name".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "BAD_REQUEST");
    }
}
