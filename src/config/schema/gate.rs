use serde::{Deserialize, Serialize};

/// A channel users must join before links are released.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateChannel {
    /// `@username` or numeric chat id
    pub id: String,
    /// Invite link shown on the join button; `@username` channels derive one
    #[serde(default)]
    pub invite_link: Option<String>,
}

impl GateChannel {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            invite_link: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Channels every link is gated on
    #[serde(default)]
    pub channels: Vec<GateChannel>,
    /// Per-channel membership lookup timeout
    #[serde(default = "default_membership_timeout_ms")]
    pub membership_timeout_ms: u64,
}

fn default_membership_timeout_ms() -> u64 {
    3000
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            channels: Vec::new(),
            membership_timeout_ms: default_membership_timeout_ms(),
        }
    }
}

impl GateConfig {
    pub fn channel_ids(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.id.clone()).collect()
    }

    /// Join URL for a channel: the configured invite link, or `t.me/<name>`
    /// for public channels.
    pub fn join_url(&self, channel: &str) -> Option<String> {
        if let Some(link) = self
            .channels
            .iter()
            .find(|c| c.id == channel)
            .and_then(|c| c.invite_link.clone())
        {
            return Some(link);
        }
        channel
            .strip_prefix('@')
            .filter(|name| !name.is_empty())
            .map(|name| format!("https://t.me/{name}"))
    }
}
