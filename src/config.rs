//! Server configuration
//!
//! Defaults match the classic relay setup: listen on every interface,
//! port 1500.

use std::time::Duration;

/// Default listening port
pub const DEFAULT_PORT: u16 = 1500;

/// Default bind host
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Channel buffer size for server commands
pub const COMMAND_BUFFER_SIZE: usize = 256;

/// Per-session chat lane size
pub const OUTBOUND_BUFFER_SIZE: usize = 32;

/// Settings for one relay server instance
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// TCP port to listen on
    pub port: u16,
    /// Capacity of the ChatServer command channel
    pub command_buffer: usize,
    /// Capacity of each session's chat lane; a full lane drops broadcasts.
    /// Server notices use a separate unbounded lane.
    pub outbound_buffer: usize,
    /// How long shutdown waits for sessions to flush and close
    pub drain_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            command_buffer: COMMAND_BUFFER_SIZE,
            outbound_buffer: OUTBOUND_BUFFER_SIZE,
            drain_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    /// `host:port` string to bind
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_addr() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 1500);
        assert_eq!(config.addr(), "0.0.0.0:1500");
    }
}
