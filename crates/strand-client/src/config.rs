//! Registry tuning knobs.

use std::time::Duration;

/// Lifecycle configuration for the connection registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Interval between background sweep passes.
    pub sweep_interval: Duration,
    /// An active room idle longer than this is backgrounded.
    pub room_inactivity: Duration,
    /// A server with no sessions idle longer than this is dropped.
    pub server_inactivity: Duration,
    /// A backgrounded room idle longer than this is suspended.
    pub suspend_after: Duration,
    /// Maximum backgrounded sessions kept per server; least-recently-used
    /// excess is disposed.
    pub max_backgrounded: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(5 * 60),
            room_inactivity: Duration::from_secs(30 * 60),
            server_inactivity: Duration::from_secs(60 * 60),
            suspend_after: Duration::from_secs(24 * 60 * 60),
            max_backgrounded: 5,
        }
    }
}
