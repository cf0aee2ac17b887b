use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Pause between items of one delivery
    #[serde(default = "default_item_delay_ms")]
    pub item_delay_ms: u64,
    /// Delete delivered messages from the user's chat after this many seconds
    #[serde(default)]
    pub auto_delete_secs: Option<u64>,
}

fn default_item_delay_ms() -> u64 {
    100
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            item_delay_ms: default_item_delay_ms(),
            auto_delete_secs: None,
        }
    }
}

impl DeliveryConfig {
    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }

    pub fn auto_delete_after(&self) -> Option<Duration> {
        self.auto_delete_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Pause between recipients
    #[serde(default = "default_broadcast_delay_ms")]
    pub delay_ms: u64,
}

fn default_broadcast_delay_ms() -> u64 {
    50
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_broadcast_delay_ms(),
        }
    }
}

impl BroadcastConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}
