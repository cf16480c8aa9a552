//! Error taxonomy for the jam broker.
//!
//! Connection-level faults are contained by the connection that raised them;
//! room- and broker-level faults surface to the caller as ordinary `Err`
//! values. Each variant carries a stable machine-readable [`code`](JamError::code).

use thiserror::Error;

use crate::frame::FrameError;
use crate::ids::{ConnectionId, RoomId};

/// Errors reported by the broker, its rooms and their connections.
#[derive(Debug, Error)]
pub enum JamError {
    /// A room was requested with a non-positive capacity.
    #[error("room capacity must be positive, got {capacity}")]
    InvalidCapacity {
        /// The rejected capacity.
        capacity: i64,
    },

    /// No live room has this ID.
    #[error("room not found: {0}")]
    RoomNotFound(RoomId),

    /// The room already holds `capacity` members.
    #[error("room {room_id} is full ({capacity} members)")]
    RoomFull {
        /// The full room.
        room_id: RoomId,
        /// Its member ceiling.
        capacity: usize,
    },

    /// The room has been closed and accepts no further operations.
    #[error("room {0} is closed")]
    RoomClosed(RoomId),

    /// The broker already holds its maximum number of rooms.
    #[error("broker is at its limit of {max_rooms} rooms")]
    TooManyRooms {
        /// Configured room ceiling.
        max_rooms: usize,
    },

    /// The broker is shutting down and creates no further rooms.
    #[error("broker is shutting down")]
    ShuttingDown,

    /// Inbound bytes did not form a valid frame.
    #[error("invalid frame: {0}")]
    InvalidFrame(#[from] FrameError),

    /// The transport rejected or timed out a write; the connection is closed.
    #[error("write to connection {connection_id} failed: {reason}")]
    WriteFailed {
        /// Connection whose transport failed.
        connection_id: ConnectionId,
        /// Transport-level reason.
        reason: String,
    },

    /// The connection was already closing or closed.
    #[error("connection {0} is closed")]
    ConnectionClosed(ConnectionId),

    /// The transport upgrade never happened, so nothing was admitted.
    #[error("transport upgrade failed: {0}")]
    UpgradeFailed(String),
}

impl JamError {
    /// Build an [`InvalidCapacity`](Self::InvalidCapacity) from an unsigned capacity.
    pub fn invalid_capacity(capacity: usize) -> Self {
        Self::InvalidCapacity {
            capacity: i64::try_from(capacity).unwrap_or(i64::MAX),
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCapacity { .. } => "INVALID_CAPACITY",
            Self::RoomNotFound(_) => "ROOM_NOT_FOUND",
            Self::RoomFull { .. } => "ROOM_FULL",
            Self::RoomClosed(_) => "ROOM_CLOSED",
            Self::TooManyRooms { .. } => "TOO_MANY_ROOMS",
            Self::ShuttingDown => "SHUTTING_DOWN",
            Self::InvalidFrame(_) => "INVALID_FRAME",
            Self::WriteFailed { .. } => "WRITE_FAILED",
            Self::ConnectionClosed(_) => "CONNECTION_CLOSED",
            Self::UpgradeFailed(_) => "UPGRADE_FAILED",
        }
    }

    /// Whether the fault belongs to a single connection rather than its room.
    pub fn is_connection_fault(&self) -> bool {
        matches!(
            self,
            Self::InvalidFrame(_) | Self::WriteFailed { .. } | Self::ConnectionClosed(_)
        )
    }
}

/// Result type for broker operations.
pub type Result<T> = std::result::Result<T, JamError>;
