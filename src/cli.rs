use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// `linkvault` - share Telegram files through deep links.
#[derive(Parser, Debug)]
#[command(name = "linkvault")]
#[command(version)]
#[command(about = "Telegram file-to-link bot with channel gates, bundles and timed deletion.", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.linkvault/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the bot (default)
    Run,

    /// Check configuration, database and Bot API access
    Doctor,

    /// Delete expired links once and exit
    PurgeExpired,
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Run)
    }
}
