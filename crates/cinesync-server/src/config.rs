//! Server configuration.

use std::net::SocketAddr;

/// Runtime configuration, overridable from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Broadcast channel capacity per room. A subscriber that lags
    /// behind this many messages starts losing the oldest ones.
    pub relay_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            relay_capacity: 256,
        }
    }
}

impl ServerConfig {
    /// Read overrides from `CINESYNC_ADDR` and `CINESYNC_RELAY_CAPACITY`.
    /// Unset or unparseable variables fall back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let bind_addr = std::env::var("CINESYNC_ADDR")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.bind_addr);
        let relay_capacity = std::env::var("CINESYNC_RELAY_CAPACITY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.relay_capacity);

        Self {
            bind_addr,
            relay_capacity,
        }
    }
}
