//! Settings → runtime configuration.

use std::time::Duration;

use rmx_broker::{BrokerConfig, RoomPolicy};
use rmx_server::ServerConfig;
use rmx_settings::{BrokerSettings, RmxSettings};

/// Build the broker configuration from loaded settings.
pub fn broker_config(settings: &BrokerSettings) -> BrokerConfig {
    BrokerConfig {
        max_rooms: settings.max_rooms,
        room_policy: RoomPolicy {
            exclude_sender: settings.exclude_sender,
            auto_close_when_empty: settings.auto_close_when_empty,
            write_timeout: Duration::from_millis(settings.write_timeout_ms),
            read_timeout: (settings.read_timeout_ms > 0)
                .then_some(Duration::from_millis(settings.read_timeout_ms)),
        },
    }
}

/// Build the listener configuration from loaded settings.
pub fn server_config(settings: &RmxSettings) -> ServerConfig {
    ServerConfig {
        host: settings.server.host.clone(),
        port: settings.server.port,
        max_message_size: settings.server.max_message_size,
        default_capacity: settings.broker.default_capacity,
        allowed_origins: settings.server.allowed_origins.clone(),
    }
}
