pub mod schema;

pub use schema::{
    BotConfig, BroadcastConfig, Config, DeliveryConfig, GateChannel, GateConfig, LinksConfig,
    SessionConfig, StorageConfig, TelegramConfig,
};
