//! Gateway configuration.

use std::time::Duration;

use mentorbot_protocol::DEFAULT_MAX_FRAME_BYTES;

/// How long a client has to send its `Handshake` after connecting.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings for the WebSocket gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,

    /// A connection that sends nothing (not even a heartbeat) for this
    /// long is closed.
    pub idle_timeout: Duration,

    /// How many directives are held for an identity with no live
    /// connection. When full, the oldest is dropped.
    pub mailbox_capacity: usize,

    /// Inbound frames larger than this are refused.
    pub max_frame_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            idle_timeout: Duration::from_secs(60),
            mailbox_capacity: 32,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = GatewayConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.idle_timeout, Duration::from_secs(60));
        assert_eq!(config.mailbox_capacity, 32);
        assert_eq!(config.max_frame_bytes, 64 * 1024);
    }
}
