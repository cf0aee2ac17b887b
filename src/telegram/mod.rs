pub mod api;
pub mod types;


pub use types::{CallbackQuery, Chat, Message, Update, User};

use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Telegram Bot API client
pub struct TelegramClient {
    bot_token: String,
    api_base: String,
    request_timeout: Duration,
    client: reqwest::Client,
}

impl TelegramClient {
    pub fn new(bot_token: String) -> Self {
        Self::with_api_base(bot_token, DEFAULT_API_BASE)
    }

    /// Point the client at another Bot API server (self-hosted, or a mock).
    pub fn with_api_base(bot_token: String, api_base: &str) -> Self {
        Self {
            bot_token,
            api_base: api_base.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(30),
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.bot_token)
    }
}
