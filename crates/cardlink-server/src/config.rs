//! Server configuration.

use std::time::Duration;

/// Tunables for the room lifecycle.
///
/// The defaults match production behavior; tests shrink them to keep the
/// sweeper observable within milliseconds.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Age at which a room is force-closed with reason `TIMEOUT`,
    /// regardless of activity.
    pub room_ttl: Duration,

    /// How often the expiry sweeper scans the registry.
    pub sweep_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            room_ttl: Duration::from_secs(60 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}
