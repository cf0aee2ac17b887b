use super::super::{
    BotConfig, BroadcastConfig, DeliveryConfig, GateConfig, LinksConfig, SessionConfig,
    StorageConfig, TelegramConfig,
};
use crate::error::ConfigError;
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub(super) const MIN_TOKEN_LENGTH: usize = 6;
pub(super) const MAX_TOKEN_LENGTH: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory - computed from the config location, not serialized
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Path to config.toml - not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub gate: GateConfig,

    #[serde(default)]
    pub links: LinksConfig,

    #[serde(default)]
    pub delivery: DeliveryConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub broadcast: BroadcastConfig,

    #[serde(default)]
    pub bot: BotConfig,
}

impl Default for Config {
    fn default() -> Self {
        let home =
            UserDirs::new().map_or_else(|| PathBuf::from("."), |u| u.home_dir().to_path_buf());
        let linkvault_dir = home.join(".linkvault");

        Self {
            data_dir: linkvault_dir.clone(),
            config_path: linkvault_dir.join("config.toml"),
            telegram: TelegramConfig::default(),
            storage: StorageConfig::default(),
            gate: GateConfig::default(),
            links: LinksConfig::default(),
            delivery: DeliveryConfig::default(),
            session: SessionConfig::default(),
            broadcast: BroadcastConfig::default(),
            bot: BotConfig::default(),
        }
    }
}

impl Config {
    /// SQLite URL: the configured one, or a file in the data directory.
    pub fn database_url(&self) -> String {
        self.storage.database_url.clone().unwrap_or_else(|| {
            format!(
                "sqlite://{}?mode=rwc",
                self.data_dir.join("linkvault.db").display()
            )
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram.bot_token.trim().is_empty() {
            return Err(ConfigError::Validation(
                "telegram.bot_token is required (or set BOT_TOKEN)".into(),
            ));
        }
        if self.telegram.archive_channel == 0 {
            return Err(ConfigError::Validation(
                "telegram.archive_channel is required (or set LOG_CHANNEL)".into(),
            ));
        }
        if !(MIN_TOKEN_LENGTH..=MAX_TOKEN_LENGTH).contains(&self.links.token_length) {
            return Err(ConfigError::Validation(format!(
                "links.token_length must be between {MIN_TOKEN_LENGTH} and {MAX_TOKEN_LENGTH}, got {}",
                self.links.token_length
            )));
        }
        if self.links.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "links.max_attempts must be at least 1".into(),
            ));
        }
        if self.bot.queue_capacity == 0 {
            return Err(ConfigError::Validation(
                "bot.queue_capacity must be at least 1".into(),
            ));
        }
        if let Some(channel) = self.gate.channels.iter().find(|c| c.id.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "gate channel id must not be empty (invite link: {})",
                channel.invite_link.as_deref().unwrap_or("none")
            )));
        }
        Ok(())
    }
}
