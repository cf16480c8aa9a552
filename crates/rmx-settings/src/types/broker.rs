//! Room broker settings.

use serde::{Deserialize, Serialize};

/// Room lifecycle and delivery policy.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrokerSettings {
    /// Maximum number of live rooms (`0` = unlimited).
    pub max_rooms: usize,
    /// Capacity used when a create request does not name one.
    pub default_capacity: usize,
    /// Whether a broadcasting member is skipped when its own frame fans out.
    pub exclude_sender: bool,
    /// Whether a room closes itself once its last member leaves.
    pub auto_close_when_empty: bool,
    /// Bound on a single transport write, in milliseconds.
    pub write_timeout_ms: u64,
    /// Idle read limit in milliseconds (`0` = disabled).
    pub read_timeout_ms: u64,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            max_rooms: 0,
            default_capacity: 2,
            exclude_sender: true,
            auto_close_when_empty: false,
            write_timeout_ms: 10_000,
            read_timeout_ms: 10_000,
        }
    }
}
