use super::TelegramClient;
use super::types::{ChatMember, Envelope, Message, MessageId, Update, User};
use crate::chat::{BotIdentity, ButtonAction, ChatPlatform, Keyboard, MemberStatus};
use crate::domain::model::MessageRef;
use crate::error::PlatformError;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Longest `retry_after` the client is willing to sleep for.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

impl TelegramClient {
    async fn call<T: DeserializeOwned>(&self, method: &str, body: &Value) -> Result<T, PlatformError> {
        self.call_with_timeout(method, body, self.request_timeout).await
    }

    /// POST one method and unwrap the `{ok, result}` envelope. A 429 is retried
    /// once after the advertised delay.
    async fn call_with_timeout<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<T, PlatformError> {
        let mut retried = false;
        loop {
            let resp = self
                .client
                .post(self.api_url(method))
                .timeout(timeout)
                .json(body)
                .send()
                .await
                .map_err(|e| request_error(method, &e))?;

            let envelope: Envelope<T> = resp.json().await.map_err(|e| PlatformError::Decode {
                method: method.to_string(),
                message: e.to_string(),
            })?;

            if envelope.ok {
                return envelope.result.ok_or_else(|| PlatformError::Decode {
                    method: method.to_string(),
                    message: "ok response without result".to_string(),
                });
            }

            let code = envelope.error_code.unwrap_or_default();
            let retry_after = envelope.parameters.and_then(|p| p.retry_after);
            if code == 429
                && !retried
                && let Some(secs) = retry_after
            {
                let wait = Duration::from_secs(secs).min(MAX_RETRY_AFTER);
                tracing::warn!("Telegram {method} rate limited, retrying in {wait:?}");
                tokio::time::sleep(wait).await;
                retried = true;
                continue;
            }

            return Err(PlatformError::Api {
                method: method.to_string(),
                code,
                description: envelope
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            });
        }
    }

    /// Long-poll for the next batch of updates after `offset`.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, PlatformError> {
        let body = json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message", "callback_query"]
        });
        let timeout = Duration::from_secs(timeout_secs) + Duration::from_secs(10);
        self.call_with_timeout("getUpdates", &body, timeout).await
    }
}

fn request_error(method: &str, err: &reqwest::Error) -> PlatformError {
    if err.is_timeout() {
        PlatformError::Timeout {
            method: method.to_string(),
        }
    } else {
        PlatformError::Request {
            method: method.to_string(),
            message: err.to_string(),
        }
    }
}

/// Numeric ids go out as numbers, `@channel` names as strings.
fn chat_ref(chat: &str) -> Value {
    chat.trim()
        .parse::<i64>()
        .map_or_else(|_| json!(chat.trim()), Value::from)
}

pub(crate) fn keyboard_markup(keyboard: &Keyboard) -> Value {
    let rows: Vec<Vec<Value>> = keyboard
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|button| match &button.action {
                    ButtonAction::Url(url) => json!({ "text": button.text, "url": url }),
                    ButtonAction::Callback(data) => {
                        json!({ "text": button.text, "callback_data": data })
                    }
                })
                .collect()
        })
        .collect();
    json!({ "inline_keyboard": rows })
}

fn member_status(method: &str, member: &ChatMember) -> Result<MemberStatus, PlatformError> {
    Ok(match member.status.as_str() {
        "creator" => MemberStatus::Creator,
        "administrator" => MemberStatus::Administrator,
        "member" => MemberStatus::Member,
        "restricted" => MemberStatus::Restricted {
            is_member: member.is_member.unwrap_or(false),
        },
        "left" => MemberStatus::Left,
        "kicked" => MemberStatus::Kicked,
        other => {
            return Err(PlatformError::Decode {
                method: method.to_string(),
                message: format!("unknown member status {other:?}"),
            });
        }
    })
}

fn with_text(chat: Value, text: &str, keyboard: Option<&Keyboard>) -> Value {
    let mut body = json!({
        "chat_id": chat,
        "text": text,
        "parse_mode": "HTML",
        "link_preview_options": { "is_disabled": true }
    });
    if let Some(keyboard) = keyboard.filter(|k| !k.is_empty()) {
        body["reply_markup"] = keyboard_markup(keyboard);
    }
    body
}

impl ChatPlatform for TelegramClient {
    fn get_me<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<BotIdentity, PlatformError>> + Send + 'a>> {
        Box::pin(async move {
            let me: User = self.call("getMe", &json!({})).await?;
            Ok(BotIdentity {
                id: me.id,
                username: me.username,
            })
        })
    }

    fn get_chat_member<'a>(
        &'a self,
        chat: &'a str,
        user_id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<MemberStatus, PlatformError>> + Send + 'a>> {
        Box::pin(async move {
            let body = json!({ "chat_id": chat_ref(chat), "user_id": user_id });
            let member: ChatMember = self.call("getChatMember", &body).await?;
            member_status("getChatMember", &member)
        })
    }

    fn copy_message<'a>(
        &'a self,
        to_chat: i64,
        source: MessageRef,
    ) -> Pin<Box<dyn Future<Output = Result<MessageRef, PlatformError>> + Send + 'a>> {
        Box::pin(async move {
            let body = json!({
                "chat_id": to_chat,
                "from_chat_id": source.chat_id,
                "message_id": source.message_id
            });
            let copied: MessageId = self.call("copyMessage", &body).await?;
            Ok(MessageRef::new(to_chat, copied.message_id))
        })
    }

    fn forward_message<'a>(
        &'a self,
        to_chat: i64,
        source: MessageRef,
    ) -> Pin<Box<dyn Future<Output = Result<MessageRef, PlatformError>> + Send + 'a>> {
        Box::pin(async move {
            let body = json!({
                "chat_id": to_chat,
                "from_chat_id": source.chat_id,
                "message_id": source.message_id
            });
            let forwarded: Message = self.call("forwardMessage", &body).await?;
            Ok(MessageRef::new(forwarded.chat.id, forwarded.message_id))
        })
    }

    fn send_message<'a>(
        &'a self,
        chat_id: i64,
        text: &'a str,
        keyboard: Option<&'a Keyboard>,
    ) -> Pin<Box<dyn Future<Output = Result<MessageRef, PlatformError>> + Send + 'a>> {
        Box::pin(async move {
            let body = with_text(json!(chat_id), text, keyboard);
            let sent: Message = self.call("sendMessage", &body).await?;
            Ok(MessageRef::new(sent.chat.id, sent.message_id))
        })
    }

    fn edit_message_text<'a>(
        &'a self,
        message: MessageRef,
        text: &'a str,
        keyboard: Option<&'a Keyboard>,
    ) -> Pin<Box<dyn Future<Output = Result<(), PlatformError>> + Send + 'a>> {
        Box::pin(async move {
            let mut body = with_text(json!(message.chat_id), text, keyboard);
            body["message_id"] = json!(message.message_id);
            // Result is the edited message, or `true` for inline messages.
            let _: Value = self.call("editMessageText", &body).await?;
            Ok(())
        })
    }

    fn delete_messages<'a>(
        &'a self,
        chat_id: i64,
        message_ids: &'a [i64],
    ) -> Pin<Box<dyn Future<Output = Result<(), PlatformError>> + Send + 'a>> {
        Box::pin(async move {
            if message_ids.is_empty() {
                return Ok(());
            }
            let body = json!({ "chat_id": chat_id, "message_ids": message_ids });
            let _: bool = self.call("deleteMessages", &body).await?;
            Ok(())
        })
    }

    fn answer_callback<'a>(
        &'a self,
        callback_id: &'a str,
        text: Option<&'a str>,
        show_alert: bool,
    ) -> Pin<Box<dyn Future<Output = Result<(), PlatformError>> + Send + 'a>> {
        Box::pin(async move {
            let mut body = json!({ "callback_query_id": callback_id, "show_alert": show_alert });
            if let Some(text) = text {
                body["text"] = json!(text);
            }
            let _: bool = self.call("answerCallbackQuery", &body).await?;
            Ok(())
        })
    }
}
