//! Capability traits for the data a room or a participant carries.
//!
//! The broker never looks inside either value; it only needs to share them
//! across tasks. Any `Send + Sync + 'static` type qualifies.

/// Descriptive data attached to a room at creation (name, tempo, ...).
pub trait RoomMetadata: Send + Sync + 'static {}

impl<T> RoomMetadata for T where T: Send + Sync + 'static {}

/// Identity of an already-authenticated participant, fixed for the
/// lifetime of its connection.
pub trait ParticipantInfo: Send + Sync + 'static {}

impl<T> ParticipantInfo for T where T: Send + Sync + 'static {}
