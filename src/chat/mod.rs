#[cfg(test)]
pub(crate) mod fake;
pub mod keyboard;
pub mod traits;

pub use keyboard::{Button, ButtonAction, Keyboard};
pub use traits::{BotIdentity, ChatPlatform, MemberStatus};
