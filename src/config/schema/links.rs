use crate::domain::model::UploadMode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinksConfig {
    /// Token length in characters (6..=32)
    #[serde(default = "default_token_length")]
    pub token_length: usize,
    /// Token generation attempts before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Lifetime applied to links created without an explicit expiry
    #[serde(default)]
    pub default_ttl_secs: Option<u64>,
    /// Upload mode used until an admin changes it
    #[serde(default)]
    pub default_upload_mode: UploadMode,
}

fn default_token_length() -> usize {
    8
}

fn default_max_attempts() -> u32 {
    10
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            token_length: default_token_length(),
            max_attempts: default_max_attempts(),
            default_ttl_secs: None,
            default_upload_mode: UploadMode::default(),
        }
    }
}

impl LinksConfig {
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Bundle sessions untouched for this long are discarded
    #[serde(default = "default_session_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_session_ttl_secs() -> u64 {
    3600
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl_secs(),
        }
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite URL. Defaults to `<data dir>/linkvault.db`.
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Interval between expired-link sweeps (0 disables the sweeper)
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_max_connections() -> u32 {
    4
}

fn default_sweep_interval_secs() -> u64 {
    600
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: default_max_connections(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}
