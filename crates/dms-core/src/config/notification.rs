//! Change-notification configuration.

use serde::{Deserialize, Serialize};

/// Settings for the change-notification channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Broadcast buffer size; slow subscribers lag past this many events.
    #[serde(default = "default_capacity")]
    pub channel_capacity: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_capacity(),
        }
    }
}

fn default_capacity() -> usize {
    1024
}
