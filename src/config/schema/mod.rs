mod base;
mod delivery;
mod gate;
mod links;
mod telegram;

pub use base::Config;
pub use delivery::{BroadcastConfig, DeliveryConfig};
pub use gate::{GateChannel, GateConfig};
pub use links::{LinksConfig, SessionConfig, StorageConfig};
pub use telegram::{BotConfig, TelegramConfig};
