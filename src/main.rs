use anyhow::Result;
use clap::Parser;
use linkvault::cli::{Cli, Commands};
use linkvault::{Config, bot, doctor};
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::load_or_init(cli.config.as_deref())?;
    match cli.command() {
        Commands::Run => {
            let shutdown = CancellationToken::new();
            let signal = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Received Ctrl-C");
                }
                signal.cancel();
            });
            bot::run(config, shutdown).await
        }
        Commands::Doctor => doctor::run(&config).await,
        Commands::PurgeExpired => {
            let purged = doctor::purge_expired(&config).await?;
            println!("Purged {purged} expired links.");
            Ok(())
        }
    }
}
