//! Room and broker policy knobs.

use std::time::Duration;

/// Default bound on a single transport write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Behavior fixed for a room at creation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoomPolicy {
    /// Skip the sending member when its own frame fans out.
    pub exclude_sender: bool,
    /// Close the room when a removal leaves it without members.
    pub auto_close_when_empty: bool,
    /// Bound on one write to one member; expiry counts as a failed write.
    pub write_timeout: Duration,
    /// Close a member that sends nothing for this long.
    pub read_timeout: Option<Duration>,
}

impl Default for RoomPolicy {
    fn default() -> Self {
        Self {
            exclude_sender: true,
            auto_close_when_empty: false,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            read_timeout: None,
        }
    }
}

/// Broker-wide configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Maximum number of live rooms (`0` = unlimited).
    pub max_rooms: usize,
    /// Policy applied to rooms created without an explicit one.
    pub room_policy: RoomPolicy,
}
