use super::App;
use super::commands::{Callback, Command, parse_callback, parse_command};
use super::replies;
use crate::chat::Keyboard;
use crate::domain::model::{MessageRef, UploadMode, UploadOptions, Uploader};
use crate::domain::resolver::Outcome;
use crate::error::LinkError;
use crate::telegram::{CallbackQuery, Message, Update, User};

/// How many links `/links` lists.
const LINKS_PAGE: u32 = 20;

impl App {
    /// Handle one update. Failures end in a reply, never in a panic or a
    /// silent drop.
    pub async fn handle_update(&self, update: Update) {
        if let Some(query) = update.callback_query {
            self.touch(&query.from).await;
            self.handle_callback(query).await;
        } else if let Some(message) = update.message {
            if !message.is_private() {
                return;
            }
            let Some(from) = message.from.clone() else {
                return;
            };
            if from.is_bot {
                return;
            }
            self.touch(&from).await;
            if let Err(e) = self.handle_message(&from, &message).await {
                self.report_failure(from.id, &e).await;
            }
        }
    }

    /// Tell a user that an update was dropped because their queue is full.
    pub(crate) async fn notify_busy(&self, user_id: i64) {
        self.reply(user_id, replies::BUSY, None).await;
    }

    async fn touch(&self, user: &User) {
        let name = user.display_name();
        if let Err(e) = self.users.touch_user(user.id, Some(&name)).await {
            tracing::warn!("Failed to record user {}: {e}", user.id);
        }
    }

    async fn report_failure(&self, chat_id: i64, err: &LinkError) {
        if replies::is_upstream(err) {
            tracing::error!("Request from {chat_id} failed: {err}");
        } else {
            tracing::debug!("Request from {chat_id} refused: {err}");
        }
        self.reply(chat_id, replies::error_reply(err), None).await;
    }

    /// Best-effort send; an undeliverable reply is only logged.
    async fn reply(&self, chat_id: i64, text: &str, keyboard: Option<&Keyboard>) -> Option<MessageRef> {
        match self.platform.send_message(chat_id, text, keyboard).await {
            Ok(sent) => Some(sent),
            Err(e) => {
                tracing::warn!("Reply to {chat_id} failed: {e}");
                None
            }
        }
    }

    fn uploader(&self, user: &User) -> Uploader {
        Uploader {
            user_id: user.id,
            is_admin: self.is_admin(user.id),
        }
    }

    async fn handle_message(&self, from: &User, message: &Message) -> Result<(), LinkError> {
        if message.has_file() {
            return self.handle_file(from, message).await;
        }
        let Some(text) = message.text.as_deref() else {
            return Ok(());
        };
        match parse_command(text) {
            Some(command) if command.is_admin_only() && !self.is_admin(from.id) => {
                self.reply(from.id, "This command is for admins.", None).await;
                Ok(())
            }
            Some(command) => self.handle_command(from, message, command).await,
            None => {
                self.reply(from.id, "Send me a file to get a link, or /help.", None)
                    .await;
                Ok(())
            }
        }
    }

    async fn handle_file(&self, from: &User, message: &Message) -> Result<(), LinkError> {
        let uploader = self.uploader(from);
        let item = MessageRef::new(message.chat.id, message.message_id);

        match self.ingest.add_to_bundle(uploader, item).await {
            Ok(count) => {
                self.reply(from.id, &replies::bundle_item_added(count), None)
                    .await;
                return Ok(());
            }
            Err(crate::error::IngestError::NoActiveSession) => {}
            Err(e) => return Err(e.into()),
        }

        let options = UploadOptions::parse(message.caption.as_deref().unwrap_or_default());
        let receipt = self.ingest.ingest_single(uploader, item, options).await?;
        tracing::info!("User {} created link {}", from.id, receipt.token);
        self.reply(
            from.id,
            &replies::link_created(&receipt, &self.bot_username),
            Some(&replies::link_keyboard(&self.bot_username, &receipt.token)),
        )
        .await;
        Ok(())
    }

    async fn handle_command(
        &self,
        from: &User,
        message: &Message,
        command: Command,
    ) -> Result<(), LinkError> {
        let user_id = from.id;
        let uploader = self.uploader(from);
        match command {
            Command::Start { token: None } => {
                self.reply(user_id, &replies::welcome(&from.first_name), None)
                    .await;
            }
            Command::Start { token: Some(token) } => self.open_link(user_id, &token).await?,
            Command::Help => {
                self.reply(user_id, &replies::help(uploader.is_admin), None)
                    .await;
            }
            Command::Batch { options } => {
                let start = self
                    .ingest
                    .begin_bundle(uploader, UploadOptions::parse(&options))
                    .await?;
                self.reply(user_id, &replies::bundle_started(start), None)
                    .await;
            }
            Command::Done => {
                let receipt = self.ingest.finalize_bundle(uploader).await?;
                self.reply(
                    user_id,
                    &replies::link_created(&receipt, &self.bot_username),
                    Some(&replies::link_keyboard(&self.bot_username, &receipt.token)),
                )
                .await;
            }
            Command::Cancel => {
                let had = self.ingest.cancel_bundle(uploader).await?;
                self.reply(user_id, replies::bundle_cancelled(had), None).await;
            }
            Command::Links => {
                let records = self.content.list_by_owner(user_id, LINKS_PAGE).await?;
                self.reply(user_id, &replies::links_list(&records, &self.bot_username), None)
                    .await;
            }
            Command::Delete { token: None } => {
                self.reply(user_id, "Usage: /delete &lt;token&gt;", None).await;
            }
            Command::Delete { token: Some(token) } => {
                let report = self.ingest.revoke(&token, user_id).await?;
                self.reply(user_id, &replies::revoked(&report), None).await;
            }
            Command::Settings | Command::Mode { mode: None } => {
                let mode = self.ingest.upload_mode().await?;
                self.reply(
                    user_id,
                    &replies::settings(mode),
                    Some(&replies::settings_keyboard(mode)),
                )
                .await;
            }
            Command::Mode { mode: Some(mode) } => {
                self.ingest.set_upload_mode(mode).await?;
                self.reply(
                    user_id,
                    &replies::settings(mode),
                    Some(&replies::settings_keyboard(mode)),
                )
                .await;
            }
            Command::Ban { user_id: target } => self.set_ban(user_id, target, true).await?,
            Command::Unban { user_id: target } => self.set_ban(user_id, target, false).await?,
            Command::Broadcast => self.broadcast(user_id, message).await?,
            Command::Stats => {
                let links = self.content.count().await?;
                let (users, banned) = self.users.user_counts().await?;
                self.reply(user_id, &replies::stats(links, users, banned), None)
                    .await;
            }
        }
        Ok(())
    }

    async fn set_ban(&self, admin_id: i64, target: Option<i64>, banned: bool) -> Result<(), LinkError> {
        let Some(target) = target else {
            let usage = if banned {
                "Usage: /ban &lt;user_id&gt;"
            } else {
                "Usage: /unban &lt;user_id&gt;"
            };
            self.reply(admin_id, usage, None).await;
            return Ok(());
        };
        if banned && self.is_admin(target) {
            self.reply(admin_id, "Admins cannot be banned.", None).await;
            return Ok(());
        }

        self.users.set_banned(target, banned).await?;
        tracing::info!("Admin {admin_id} set ban={banned} for user {target}");
        let text = if banned {
            format!("User {target} is banned.")
        } else {
            format!("User {target} is unbanned.")
        };
        self.reply(admin_id, &text, None).await;
        Ok(())
    }

    async fn broadcast(&self, admin_id: i64, message: &Message) -> Result<(), LinkError> {
        let Some(source) = message.reply_to_message.as_deref() else {
            self.reply(
                admin_id,
                "Reply to the message you want to broadcast with /broadcast.",
                None,
            )
            .await;
            return Ok(());
        };

        let recipients = self.users.broadcast_recipients().await?;
        self.reply(
            admin_id,
            &format!("Broadcasting to {} users…", recipients.len()),
            None,
        )
        .await;
        let report = self
            .broadcaster
            .broadcast(MessageRef::new(source.chat.id, source.message_id), &recipients)
            .await;
        self.reply(admin_id, &replies::broadcast_done(&report), None)
            .await;
        Ok(())
    }

    /// Resolve a deep link and act on the outcome.
    async fn open_link(&self, user_id: i64, token: &str) -> Result<(), LinkError> {
        let outcome = self.resolver.resolve(token, user_id).await?;
        self.present(user_id, token, outcome).await;
        Ok(())
    }

    async fn present(&self, user_id: i64, token: &str, outcome: Outcome) {
        match outcome {
            Outcome::NotFound => {
                self.reply(user_id, replies::not_found(), None).await;
            }
            Outcome::Banned => {
                self.reply(user_id, replies::banned(), None).await;
            }
            Outcome::Denied { missing } => {
                let keyboard = replies::denied_keyboard(&self.gate, &missing, token);
                self.reply(user_id, &replies::denied(&missing), Some(&keyboard))
                    .await;
            }
            Outcome::Allowed { record } => {
                let report = self.delivery.deliver(&record.items, user_id).await;
                if let Some(summary) = replies::delivery_summary(&report) {
                    self.reply(user_id, &summary, None).await;
                }
                if let Some(after) = self.auto_delete
                    && !report.sent.is_empty()
                {
                    let mut refs = report.sent;
                    if let Some(notice) = self
                        .reply(user_id, &replies::auto_delete_notice(after), None)
                        .await
                    {
                        refs.push(notice);
                    }
                    self.retraction.schedule(user_id, refs, after);
                }
            }
        }
    }

    async fn handle_callback(&self, query: CallbackQuery) {
        let user_id = query.from.id;
        let Some(callback) = query.data.as_deref().and_then(parse_callback) else {
            self.answer(&query.id, None, false).await;
            return;
        };

        match callback {
            Callback::Check { token } => {
                let outcome = match self.resolver.resolve(&token, user_id).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        self.answer(&query.id, Some(replies::error_reply(&e)), true)
                            .await;
                        tracing::error!("Re-checking {token} for {user_id} failed: {e}");
                        return;
                    }
                };
                if let Outcome::Denied { missing } = &outcome {
                    let text = format!("Still missing: {}", missing.join(", "));
                    self.answer(&query.id, Some(&text), true).await;
                    return;
                }
                self.answer(&query.id, None, false).await;
                // The gate prompt has served its purpose.
                if let Some(prompt) = &query.message
                    && let Err(e) = self
                        .platform
                        .delete_messages(prompt.chat.id, &[prompt.message_id])
                        .await
                {
                    tracing::debug!("Could not remove gate prompt: {e}");
                }
                self.present(user_id, &token, outcome).await;
            }
            Callback::SetMode(mode) => self.handle_mode_callback(&query, mode).await,
        }
    }

    async fn handle_mode_callback(&self, query: &CallbackQuery, mode: UploadMode) {
        if !self.is_admin(query.from.id) {
            self.answer(&query.id, Some("Admins only."), true).await;
            return;
        }
        if let Err(e) = self.ingest.set_upload_mode(mode).await {
            tracing::error!("Setting upload mode failed: {e}");
            self.answer(&query.id, Some(replies::TRY_LATER), true).await;
            return;
        }
        self.answer(&query.id, Some("Upload mode updated."), false)
            .await;
        if let Some(message) = &query.message {
            let target = MessageRef::new(message.chat.id, message.message_id);
            let keyboard = replies::settings_keyboard(mode);
            if let Err(e) = self
                .platform
                .edit_message_text(target, &replies::settings(mode), Some(&keyboard))
                .await
            {
                tracing::warn!("Could not refresh settings message: {e}");
            }
        }
    }

    async fn answer(&self, callback_id: &str, text: Option<&str>, alert: bool) {
        if let Err(e) = self.platform.answer_callback(callback_id, text, alert).await {
            tracing::warn!("answerCallbackQuery failed: {e}");
        }
    }
}
