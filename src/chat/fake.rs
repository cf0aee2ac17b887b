//! In-memory `ChatPlatform` for unit tests.

use super::keyboard::Keyboard;
use super::traits::{BotIdentity, ChatPlatform, MemberStatus};
use crate::domain::model::MessageRef;
use crate::error::PlatformError;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    GetChatMember { chat: String, user_id: i64 },
    Copy { to_chat: i64, source: MessageRef },
    Forward { to_chat: i64, source: MessageRef },
    Send { chat_id: i64, text: String, keyboard: Option<Keyboard> },
    Edit { message: MessageRef, text: String },
    Delete { chat_id: i64, message_ids: Vec<i64> },
    Answer { callback_id: String, text: Option<String> },
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    members: HashMap<(String, i64), MemberStatus>,
    failing_chats: HashSet<String>,
    slow_chats: HashMap<String, Duration>,
    failing_sources: HashSet<i64>,
    blocked_chats: HashSet<i64>,
    failing_deletes: HashSet<i64>,
}

pub(crate) struct FakePlatform {
    state: Mutex<State>,
    next_id: AtomicI64,
}

impl FakePlatform {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            next_id: AtomicI64::new(1000),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut state)
    }

    pub(crate) fn set_member(&self, chat: &str, user_id: i64, status: MemberStatus) {
        self.with(|s| s.members.insert((chat.to_string(), user_id), status));
    }

    /// Membership lookups in `chat` return an API error.
    pub(crate) fn fail_membership(&self, chat: &str) {
        self.with(|s| s.failing_chats.insert(chat.to_string()));
    }

    /// Membership lookups in `chat` take `delay` before answering.
    pub(crate) fn delay_membership(&self, chat: &str, delay: Duration) {
        self.with(|s| s.slow_chats.insert(chat.to_string(), delay));
    }

    /// Copies and forwards of this source message id fail.
    pub(crate) fn fail_source(&self, message_id: i64) {
        self.with(|s| s.failing_sources.insert(message_id));
    }

    /// Sends and copies into this chat fail with 403.
    pub(crate) fn block(&self, chat_id: i64) {
        self.with(|s| s.blocked_chats.insert(chat_id));
    }

    pub(crate) fn fail_deletes_in(&self, chat_id: i64) {
        self.with(|s| s.failing_deletes.insert(chat_id));
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.with(|s| s.calls.clone())
    }

    pub(crate) fn copies_to(&self, chat_id: i64) -> Vec<MessageRef> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Copy { to_chat, source } if to_chat == chat_id => Some(source),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn forwards(&self) -> Vec<MessageRef> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Forward { source, .. } => Some(source),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn texts_to(&self, chat: i64) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Send { chat_id, text, .. } if chat_id == chat => Some(text),
                Call::Edit { message, text } if message.chat_id == chat => Some(text),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn deleted_in(&self, chat: i64) -> Vec<i64> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Delete {
                    chat_id,
                    message_ids,
                } if chat_id == chat => Some(message_ids),
                _ => None,
            })
            .flatten()
            .collect()
    }

    fn mint(&self, chat_id: i64) -> MessageRef {
        MessageRef::new(chat_id, self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn api_error(method: &str, code: i64, description: &str) -> PlatformError {
        PlatformError::Api {
            method: method.to_string(),
            code,
            description: description.to_string(),
        }
    }

    fn relay(&self, method: &str, to_chat: i64, source: MessageRef) -> Result<MessageRef, PlatformError> {
        let (blocked, failing) = self.with(|s| {
            (
                s.blocked_chats.contains(&to_chat),
                s.failing_sources.contains(&source.message_id),
            )
        });
        if blocked {
            return Err(Self::api_error(method, 403, "Forbidden: bot was blocked by the user"));
        }
        if failing {
            return Err(Self::api_error(method, 400, "Bad Request: message to copy not found"));
        }
        Ok(self.mint(to_chat))
    }
}

impl ChatPlatform for FakePlatform {
    fn get_me<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<BotIdentity, PlatformError>> + Send + 'a>> {
        Box::pin(async move {
            Ok(BotIdentity {
                id: 1,
                username: Some("vault_bot".into()),
            })
        })
    }

    fn get_chat_member<'a>(
        &'a self,
        chat: &'a str,
        user_id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<MemberStatus, PlatformError>> + Send + 'a>> {
        Box::pin(async move {
            let delay = self.with(|s| s.slow_chats.get(chat).copied());
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.with(|s| {
                s.calls.push(Call::GetChatMember {
                    chat: chat.to_string(),
                    user_id,
                });
                if s.failing_chats.contains(chat) {
                    return Err(Self::api_error("getChatMember", 400, "Bad Request: chat not found"));
                }
                Ok(s.members
                    .get(&(chat.to_string(), user_id))
                    .copied()
                    .unwrap_or(MemberStatus::Left))
            })
        })
    }

    fn copy_message<'a>(
        &'a self,
        to_chat: i64,
        source: MessageRef,
    ) -> Pin<Box<dyn Future<Output = Result<MessageRef, PlatformError>> + Send + 'a>> {
        Box::pin(async move {
            self.with(|s| s.calls.push(Call::Copy { to_chat, source }));
            self.relay("copyMessage", to_chat, source)
        })
    }

    fn forward_message<'a>(
        &'a self,
        to_chat: i64,
        source: MessageRef,
    ) -> Pin<Box<dyn Future<Output = Result<MessageRef, PlatformError>> + Send + 'a>> {
        Box::pin(async move {
            self.with(|s| s.calls.push(Call::Forward { to_chat, source }));
            self.relay("forwardMessage", to_chat, source)
        })
    }

    fn send_message<'a>(
        &'a self,
        chat_id: i64,
        text: &'a str,
        keyboard: Option<&'a Keyboard>,
    ) -> Pin<Box<dyn Future<Output = Result<MessageRef, PlatformError>> + Send + 'a>> {
        Box::pin(async move {
            let blocked = self.with(|s| {
                s.calls.push(Call::Send {
                    chat_id,
                    text: text.to_string(),
                    keyboard: keyboard.cloned(),
                });
                s.blocked_chats.contains(&chat_id)
            });
            if blocked {
                return Err(Self::api_error("sendMessage", 403, "Forbidden: bot was blocked by the user"));
            }
            Ok(self.mint(chat_id))
        })
    }

    fn edit_message_text<'a>(
        &'a self,
        message: MessageRef,
        text: &'a str,
        _keyboard: Option<&'a Keyboard>,
    ) -> Pin<Box<dyn Future<Output = Result<(), PlatformError>> + Send + 'a>> {
        Box::pin(async move {
            self.with(|s| {
                s.calls.push(Call::Edit {
                    message,
                    text: text.to_string(),
                });
            });
            Ok(())
        })
    }

    fn delete_messages<'a>(
        &'a self,
        chat_id: i64,
        message_ids: &'a [i64],
    ) -> Pin<Box<dyn Future<Output = Result<(), PlatformError>> + Send + 'a>> {
        Box::pin(async move {
            let failing = self.with(|s| {
                s.calls.push(Call::Delete {
                    chat_id,
                    message_ids: message_ids.to_vec(),
                });
                s.failing_deletes.contains(&chat_id)
            });
            if failing {
                return Err(Self::api_error("deleteMessages", 400, "Bad Request: message can't be deleted"));
            }
            Ok(())
        })
    }

    fn answer_callback<'a>(
        &'a self,
        callback_id: &'a str,
        text: Option<&'a str>,
        _show_alert: bool,
    ) -> Pin<Box<dyn Future<Output = Result<(), PlatformError>> + Send + 'a>> {
        Box::pin(async move {
            self.with(|s| {
                s.calls.push(Call::Answer {
                    callback_id: callback_id.to_string(),
                    text: text.map(str::to_string),
                });
            });
            Ok(())
        })
    }
}
