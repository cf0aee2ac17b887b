use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot API token from @BotFather
    #[serde(default)]
    pub bot_token: String,
    /// Username used in deep links. Resolved with `getMe` when unset.
    #[serde(default)]
    pub bot_username: Option<String>,
    /// Private channel that receives archived copies of every upload
    #[serde(default)]
    pub archive_channel: i64,
    /// Numeric user ids allowed to run admin commands
    #[serde(default)]
    pub admin_ids: Vec<i64>,
    /// Bot API base URL (default: https://api.telegram.org)
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Long-poll timeout passed to getUpdates
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

fn default_api_base() -> String {
    "https://api.telegram.org".into()
}

fn default_poll_timeout_secs() -> u64 {
    30
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            bot_username: None,
            archive_channel: 0,
            admin_ids: Vec::new(),
            api_base: default_api_base(),
            poll_timeout_secs: default_poll_timeout_secs(),
        }
    }
}

impl TelegramConfig {
    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Per-user queue capacity before updates wait for the worker
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Idle time after which a per-user worker exits
    #[serde(default = "default_worker_idle_secs")]
    pub worker_idle_secs: u64,
}

fn default_queue_capacity() -> usize {
    32
}

fn default_worker_idle_secs() -> u64 {
    300
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            worker_idle_secs: default_worker_idle_secs(),
        }
    }
}
