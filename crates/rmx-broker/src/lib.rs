//! # rmx-broker
//!
//! The real-time room broker: capacity-bounded jam rooms that admit
//! participants over persistent connections and fan frames out to every
//! live member.
//!
//! - [`Broker`]: sole owner of the live room registry
//! - [`Room`]: membership bound, admission, eviction and broadcast
//! - [`Connection`]: one participant's transport, write lock and read pump
//! - [`transport`]: the `FrameSink` / `FrameSource` seam a transport implements
//!
//! Rooms and connections are purely in-memory and never survive a restart.

#![deny(unsafe_code)]

pub mod broker;
pub mod connection;
pub mod policy;
pub mod room;
pub mod telemetry;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use broker::Broker;
pub use connection::{Connection, ConnectionState};
pub use policy::{BrokerConfig, RoomPolicy};
pub use room::{BroadcastReport, Room, RoomState, RoomStatus};
pub use transport::{FrameSink, FrameSource, TransportError};
