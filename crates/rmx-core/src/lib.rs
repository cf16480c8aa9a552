//! # rmx-core
//!
//! Foundational types shared by every rmx crate:
//!
//! - [`ids`]: branded `RoomId` / `ConnectionId` newtypes
//! - [`frame`]: the wire frame codec (tag byte + opaque payload)
//! - [`errors`]: the [`JamError`] taxonomy reported by the broker
//! - [`metadata`]: capability traits for room and participant metadata
//! - [`logging`]: `tracing` subscriber setup

#![deny(unsafe_code)]

pub mod errors;
pub mod frame;
pub mod ids;
pub mod logging;
pub mod metadata;

pub use errors::{JamError, Result};
pub use frame::{Frame, FrameError, FrameTag};
pub use ids::{ConnectionId, RoomId};
pub use metadata::{ParticipantInfo, RoomMetadata};
