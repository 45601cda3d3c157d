//! Controller timing configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How long and how often the controller waits on the amplifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Deadline for a terminated reply after a command is sent
    pub response_timeout: Duration,
    /// Extra status attempts after the first one fails
    pub max_retries: u32,
    /// Pause between status attempts
    pub retry_delay: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(1),
            max_retries: 4,
            retry_delay: Duration::ZERO,
        }
    }
}

impl ControllerConfig {
    /// Total number of times a status query is sent before giving up
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}
