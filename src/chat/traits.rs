use super::keyboard::Keyboard;
use crate::domain::model::MessageRef;
use crate::error::PlatformError;
use std::future::Future;
use std::pin::Pin;

/// Membership of a user in a chat, as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    Creator,
    Administrator,
    Member,
    Restricted { is_member: bool },
    Left,
    Kicked,
}

impl MemberStatus {
    pub fn is_member(self) -> bool {
        match self {
            Self::Creator | Self::Administrator | Self::Member => true,
            Self::Restricted { is_member } => is_member,
            Self::Left | Self::Kicked => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub id: i64,
    pub username: Option<String>,
}

/// Chat platform operations the bot relies on. Every call may fail;
/// callers never assume success.
pub trait ChatPlatform: Send + Sync {
    fn get_me<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<BotIdentity, PlatformError>> + Send + 'a>>;

    /// `chat` is `@username` or a numeric id.
    fn get_chat_member<'a>(
        &'a self,
        chat: &'a str,
        user_id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<MemberStatus, PlatformError>> + Send + 'a>>;

    /// Copy without the "forwarded from" header. Returns the new message.
    fn copy_message<'a>(
        &'a self,
        to_chat: i64,
        source: MessageRef,
    ) -> Pin<Box<dyn Future<Output = Result<MessageRef, PlatformError>> + Send + 'a>>;

    fn forward_message<'a>(
        &'a self,
        to_chat: i64,
        source: MessageRef,
    ) -> Pin<Box<dyn Future<Output = Result<MessageRef, PlatformError>> + Send + 'a>>;

    fn send_message<'a>(
        &'a self,
        chat_id: i64,
        text: &'a str,
        keyboard: Option<&'a Keyboard>,
    ) -> Pin<Box<dyn Future<Output = Result<MessageRef, PlatformError>> + Send + 'a>>;

    fn edit_message_text<'a>(
        &'a self,
        message: MessageRef,
        text: &'a str,
        keyboard: Option<&'a Keyboard>,
    ) -> Pin<Box<dyn Future<Output = Result<(), PlatformError>> + Send + 'a>>;

    fn delete_messages<'a>(
        &'a self,
        chat_id: i64,
        message_ids: &'a [i64],
    ) -> Pin<Box<dyn Future<Output = Result<(), PlatformError>> + Send + 'a>>;

    fn answer_callback<'a>(
        &'a self,
        callback_id: &'a str,
        text: Option<&'a str>,
        show_alert: bool,
    ) -> Pin<Box<dyn Future<Output = Result<(), PlatformError>> + Send + 'a>>;
}
