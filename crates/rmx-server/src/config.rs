//! Server configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the rmx HTTP / `WebSocket` listener.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Max inbound `WebSocket` message size in bytes.
    pub max_message_size: usize,
    /// Capacity for `POST /jam` requests that do not name one.
    pub default_capacity: usize,
    /// CORS allow-list. Empty allows any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_message_size: 64 * 1024,
            default_capacity: 2,
            allowed_origins: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_host() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.host, "127.0.0.1");
    }

    #[test]
    fn default_port_is_zero() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.port, 0);
    }

    #[test]
    fn default_capacity_is_a_pair() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.default_capacity, 2);
    }

    #[test]
    fn default_allows_any_origin() {
        let cfg = ServerConfig::default();
        assert!(cfg.allowed_origins.is_empty());
    }

    #[test]
    fn deserialize_from_json_string() {
        let json = r#"{"host":"10.0.0.1","port":3000,"max_message_size":512,"default_capacity":4,"allowed_origins":["http://a"]}"#;
        let cfg: ServerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.host, "10.0.0.1");
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.default_capacity, 4);
        assert_eq!(cfg.allowed_origins, vec!["http://a".to_string()]);
    }
}
