//! Settings types.

mod broker;
mod server;

pub use broker::BrokerSettings;
pub use server::{LoggingSettings, ServerSettings};

use serde::{Deserialize, Serialize};

/// Root settings object, serialized as `~/.rmx/settings.json`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RmxSettings {
    /// HTTP / WebSocket listener.
    pub server: ServerSettings,
    /// Room broker policy.
    pub broker: BrokerSettings,
    /// Log output.
    pub logging: LoggingSettings,
}
