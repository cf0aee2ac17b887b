use super::super::GateChannel;
use super::Config;

fn env_var(primary: &str, legacy: &str) -> Option<String> {
    std::env::var(primary)
        .or_else(|_| std::env::var(legacy))
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Gate channel entries: `updates`, `@updates` or `-100123`. Bare names get an `@`.
fn parse_gate_channels(raw: &str) -> Vec<GateChannel> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            if entry.starts_with('@') || entry.parse::<i64>().is_ok() {
                GateChannel::new(entry)
            } else {
                GateChannel::new(format!("@{entry}"))
            }
        })
        .collect()
}

fn parse_admin_ids(raw: &str) -> Vec<i64> {
    raw.split(',')
        .filter_map(|id| {
            let id = id.trim();
            if id.is_empty() {
                return None;
            }
            match id.parse::<i64>() {
                Ok(id) => Some(id),
                Err(_) => {
                    tracing::warn!("Ignoring malformed admin id: {id}");
                    None
                }
            }
        })
        .collect()
}

impl Config {
    pub fn apply_env_overrides(&mut self) {
        if let Some(token) = env_var("LINKVAULT_BOT_TOKEN", "BOT_TOKEN") {
            self.telegram.bot_token = token;
        }

        if let Some(username) = env_var("LINKVAULT_BOT_USERNAME", "BOT_USERNAME") {
            self.telegram.bot_username = Some(username.trim_start_matches('@').to_string());
        }

        if let Some(channel) = env_var("LINKVAULT_ARCHIVE_CHANNEL", "LOG_CHANNEL")
            && let Ok(channel) = channel.parse::<i64>()
        {
            self.telegram.archive_channel = channel;
        }

        if let Some(ids) = env_var("LINKVAULT_ADMIN_IDS", "ADMIN_IDS") {
            self.telegram.admin_ids = parse_admin_ids(&ids);
        }

        if let Some(channels) = env_var("LINKVAULT_GATE_CHANNELS", "UPDATE_CHANNEL") {
            self.gate.channels = parse_gate_channels(&channels);
        }

        if let Some(url) = env_var("LINKVAULT_DATABASE_URL", "DATABASE_URL") {
            self.storage.database_url = Some(url);
        }

        if let Some(secs) = env_var("LINKVAULT_AUTO_DELETE_SECS", "AUTO_DELETE_SECS")
            && let Ok(secs) = secs.parse::<u64>()
        {
            self.delivery.auto_delete_secs = (secs > 0).then_some(secs);
        }
    }
}
