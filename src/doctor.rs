use crate::chat::{ChatPlatform, MemberStatus};
use crate::config::Config;
use crate::store::{ContentStore, SqliteStore, UserStore};
use crate::telegram::TelegramClient;
use anyhow::Result;
use chrono::Utc;

/// Check config, database and Bot API access, printing one line per check.
pub async fn run(config: &Config) -> Result<()> {
    println!("🩺 linkvault doctor");
    println!("  Config: {}", config.config_path.display());
    for line in config_lines(config) {
        println!("    {line}");
    }

    match SqliteStore::open(&config.database_url(), config.storage.max_connections).await {
        Ok(store) => {
            let links = store.count().await?;
            let (users, banned) = store.user_counts().await?;
            println!("  ✅ database ok ({links} links, {users} users, {banned} banned)");
        }
        Err(e) => println!("  ❌ database: {e}"),
    }

    let client = TelegramClient::with_api_base(
        config.telegram.bot_token.clone(),
        &config.telegram.api_base,
    );
    let me = match client.get_me().await {
        Ok(me) => me,
        Err(e) => {
            println!("  ❌ Bot API: {e}");
            return Ok(());
        }
    };
    println!(
        "  ✅ Bot API ok (@{})",
        me.username.as_deref().unwrap_or("<no username>")
    );

    let archive = config.telegram.archive_channel.to_string();
    println!(
        "  {} archive channel {archive}",
        status_mark(&client.get_chat_member(&archive, me.id).await)
    );
    for channel in config.gate.channel_ids() {
        // Membership lookups only work where the bot is an admin.
        println!(
            "  {} gate channel {channel}",
            status_mark(&client.get_chat_member(&channel, me.id).await)
        );
    }
    Ok(())
}

/// Purge expired links once. Returns the number removed.
pub async fn purge_expired(config: &Config) -> Result<u64> {
    let store = SqliteStore::open(&config.database_url(), config.storage.max_connections).await?;
    Ok(store.purge_expired(Utc::now()).await?)
}

fn status_mark<E: std::fmt::Display>(result: &std::result::Result<MemberStatus, E>) -> String {
    match result {
        Ok(MemberStatus::Creator | MemberStatus::Administrator) => "✅ bot is admin in".into(),
        Ok(status) => format!("❌ bot is not admin ({status:?}) in"),
        Err(e) => format!("❌ lookup failed ({e}) for"),
    }
}

pub(crate) fn config_lines(config: &Config) -> Vec<String> {
    let mut lines = vec![
        format!("admins: {}", config.telegram.admin_ids.len()),
        format!(
            "gate channels: {}",
            if config.gate.channels.is_empty() {
                "none".to_string()
            } else {
                config.gate.channel_ids().join(", ")
            }
        ),
        format!(
            "default upload mode: {}",
            config.links.default_upload_mode.as_str()
        ),
        format!(
            "auto delete: {}",
            config
                .delivery
                .auto_delete_after()
                .map_or_else(|| "off".to_string(), |d| format!("{}s", d.as_secs()))
        ),
    ];
    if config.telegram.admin_ids.is_empty() {
        lines.push("⚠️ no admin ids configured; admin commands are unusable".into());
    }
    lines
}
