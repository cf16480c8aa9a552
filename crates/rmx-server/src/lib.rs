//! # rmx-server
//!
//! Axum HTTP + `WebSocket` boundary for the jam broker.
//!
//! - `POST /jam`, `GET /jam`, `GET /jam/{id}`, `DELETE /jam/{id}`: room management
//! - `GET /ws/jam/{id}`: admission check, then `WebSocket` upgrade and admit
//! - `GET /health`, `GET /ping`, `GET /metrics`: liveness and observability
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod health;
pub mod identity;
pub mod jam;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use error::ApiError;
pub use identity::{HeaderParticipantResolver, ParticipantResolver};
pub use jam::{Jam, JamBroker, Participant};
pub use server::{AppState, RmxServer};
pub use shutdown::ShutdownCoordinator;
