//! Coordinator configuration.

use std::time::Duration;

/// Default deadline for an approval exchange.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Coordinator configuration.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// How long a worker waits for an answer before treating it as denied.
    pub request_timeout: Duration,

    /// Outbound queue depth of each attached channel.
    pub channel_buffer: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            channel_buffer: 32,
        }
    }
}
