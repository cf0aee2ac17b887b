//! Bot runtime: long-polling, per-user dispatch and the command handlers.

pub mod commands;
pub mod dispatch;
mod handlers;
pub mod replies;


use crate::chat::ChatPlatform;
use crate::config::{Config, GateConfig};
use crate::domain::{
    Broadcaster, DeliveryOrchestrator, IngestDeps, IngestionHandler, LinkResolver,
    PlatformMembershipOracle, RetractionScheduler, SessionTracker, TokenGenerator,
};
use crate::store::{ContentStore, SqliteStore, UserStore};
use crate::telegram::TelegramClient;
use anyhow::{Context, Result};
use chrono::Utc;
use dispatch::Dispatcher;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Poll errors back off this long before the next attempt.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Shared context of every handler.
pub struct App {
    platform: Arc<dyn ChatPlatform>,
    content: Arc<dyn ContentStore>,
    users: Arc<dyn UserStore>,
    resolver: LinkResolver,
    delivery: Arc<DeliveryOrchestrator>,
    retraction: Arc<RetractionScheduler>,
    ingest: IngestionHandler,
    broadcaster: Broadcaster,
    gate: GateConfig,
    admin_ids: Vec<i64>,
    auto_delete: Option<Duration>,
    bot_username: String,
}

impl App {
    pub fn new(
        config: &Config,
        platform: Arc<dyn ChatPlatform>,
        store: &SqliteStore,
        bot_username: String,
    ) -> Self {
        let content: Arc<dyn ContentStore> = Arc::new(store.clone());
        let users: Arc<dyn UserStore> = Arc::new(store.clone());

        let oracle = PlatformMembershipOracle::new(
            Arc::clone(&platform),
            Duration::from_millis(config.gate.membership_timeout_ms),
        );
        let resolver = LinkResolver::new(
            Arc::clone(&content),
            Arc::clone(&users),
            Arc::new(oracle),
            config.gate.channel_ids(),
        );
        let delivery = Arc::new(DeliveryOrchestrator::new(
            Arc::clone(&platform),
            config.delivery.item_delay(),
        ));
        let sessions = Arc::new(SessionTracker::new(
            Arc::new(store.clone()),
            config.session.ttl(),
        ));
        let ingest = IngestionHandler::new(
            IngestDeps {
                platform: Arc::clone(&platform),
                store: Arc::clone(&content),
                users: Arc::clone(&users),
                settings: Arc::new(store.clone()),
                sessions,
                delivery: Arc::clone(&delivery),
            },
            TokenGenerator::new(config.links.token_length, config.links.max_attempts),
            config.telegram.archive_channel,
            config.links.default_upload_mode,
            config.links.default_ttl(),
        );

        Self {
            retraction: RetractionScheduler::new(Arc::clone(&platform)),
            broadcaster: Broadcaster::new(Arc::clone(&platform), config.broadcast.delay()),
            platform,
            content,
            users,
            resolver,
            delivery,
            ingest,
            gate: config.gate.clone(),
            admin_ids: config.telegram.admin_ids.clone(),
            auto_delete: config.delivery.auto_delete_after(),
            bot_username: bot_username.trim_start_matches('@').to_string(),
        }
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }

    pub fn bot_username(&self) -> &str {
        &self.bot_username
    }

    /// Retractions still waiting to fire.
    pub fn pending_retractions(&self) -> usize {
        self.retraction.pending()
    }
}

/// Run the bot until `shutdown` is cancelled.
pub async fn run(config: Config, shutdown: CancellationToken) -> Result<()> {
    let store = SqliteStore::open(&config.database_url(), config.storage.max_connections)
        .await
        .context("open database")?;
    let client = Arc::new(TelegramClient::with_api_base(
        config.telegram.bot_token.clone(),
        &config.telegram.api_base,
    ));

    let bot_username = match config.telegram.bot_username.clone() {
        Some(name) => name,
        None => client
            .get_me()
            .await
            .context("getMe")?
            .username
            .context("the bot account has no username")?,
    };
    tracing::info!("Starting linkvault as @{}", bot_username.trim_start_matches('@'));

    let app = Arc::new(App::new(
        &config,
        Arc::clone(&client) as Arc<dyn ChatPlatform>,
        &store,
        bot_username,
    ));
    let sweeper = spawn_sweeper(
        store,
        Duration::from_secs(config.storage.sweep_interval_secs),
        shutdown.clone(),
    );
    let mut dispatcher = Dispatcher::new(
        Arc::clone(&app),
        config.bot.queue_capacity,
        Duration::from_secs(config.bot.worker_idle_secs),
    );

    poll_updates(&client, &mut dispatcher, config.telegram.poll_timeout_secs, &shutdown).await;

    tracing::info!("Shutting down: draining {} workers", dispatcher.active());
    dispatcher.shutdown().await;
    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    app.retraction.shutdown();
    Ok(())
}

async fn poll_updates(
    client: &TelegramClient,
    dispatcher: &mut Dispatcher,
    timeout_secs: u64,
    shutdown: &CancellationToken,
) {
    let mut offset: i64 = 0;
    tracing::info!("Polling Telegram for updates...");

    loop {
        let batch = tokio::select! {
            () = shutdown.cancelled() => return,
            batch = client.get_updates(offset, timeout_secs) => batch,
        };

        match batch {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    dispatcher.dispatch(update);
                }
                dispatcher.prune();
            }
            Err(e) => {
                tracing::warn!("Telegram poll error: {e}");
                tokio::select! {
                    () = shutdown.cancelled() => return,
                    () = tokio::time::sleep(POLL_RETRY_DELAY) => {}
                }
            }
        }
    }
}

/// Periodically delete expired links. `None` when the interval is zero.
pub fn spawn_sweeper(
    store: SqliteStore,
    every: Duration,
    shutdown: CancellationToken,
) -> Option<JoinHandle<()>> {
    if every.is_zero() {
        tracing::info!("Expired-link sweeper disabled");
        return None;
    }
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            match store.purge_expired(Utc::now()).await {
                Ok(0) => {}
                Ok(purged) => tracing::info!("Purged {purged} expired links"),
                Err(e) => tracing::error!("Expired-link sweep failed: {e}"),
            }
        }
    }))
}
