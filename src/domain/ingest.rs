//! Upload side: archive incoming files and mint links for them.

use crate::chat::ChatPlatform;
use crate::domain::delivery::DeliveryOrchestrator;
use crate::domain::model::{
    ContentKind, ContentRecord, MessageRef, RecordError, UploadMode, UploadOptions, Uploader,
};
use crate::domain::session::SessionTracker;
use crate::domain::token::TokenGenerator;
use crate::error::IngestError;
use crate::store::{ContentStore, SettingsStore, UserStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReceipt {
    pub token: String,
    /// Archived copies, in upload order.
    pub items: Vec<MessageRef>,
    /// Items that could not be archived and are not part of the link.
    pub failed: usize,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundleStart {
    /// Items discarded from a session that was still open.
    pub replaced: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevokeReport {
    pub token: String,
    pub archived_removed: usize,
    pub archived_failed: usize,
}

impl RevokeReport {
    pub fn is_partial(&self) -> bool {
        self.archived_failed > 0
    }
}

pub struct IngestionHandler {
    platform: Arc<dyn ChatPlatform>,
    store: Arc<dyn ContentStore>,
    users: Arc<dyn UserStore>,
    settings: Arc<dyn SettingsStore>,
    sessions: Arc<SessionTracker>,
    delivery: Arc<DeliveryOrchestrator>,
    generator: TokenGenerator,
    archive_channel: i64,
    default_mode: UploadMode,
    default_ttl: Option<Duration>,
}

/// Everything the handler needs, grouped so construction stays readable.
pub struct IngestDeps {
    pub platform: Arc<dyn ChatPlatform>,
    pub store: Arc<dyn ContentStore>,
    pub users: Arc<dyn UserStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub sessions: Arc<SessionTracker>,
    pub delivery: Arc<DeliveryOrchestrator>,
}

impl IngestionHandler {
    pub fn new(
        deps: IngestDeps,
        generator: TokenGenerator,
        archive_channel: i64,
        default_mode: UploadMode,
        default_ttl: Option<Duration>,
    ) -> Self {
        Self {
            platform: deps.platform,
            store: deps.store,
            users: deps.users,
            settings: deps.settings,
            sessions: deps.sessions,
            delivery: deps.delivery,
            generator,
            archive_channel,
            default_mode,
            default_ttl,
        }
    }

    /// Persisted mode, falling back to the configured default.
    pub async fn upload_mode(&self) -> Result<UploadMode, IngestError> {
        Ok(self
            .settings
            .upload_mode()
            .await?
            .unwrap_or(self.default_mode))
    }

    pub async fn set_upload_mode(&self, mode: UploadMode) -> Result<(), IngestError> {
        self.settings.set_upload_mode(mode).await?;
        tracing::info!("Upload mode set to {}", mode.as_str());
        Ok(())
    }

    pub async fn ingest_single(
        &self,
        uploader: Uploader,
        item: MessageRef,
        options: UploadOptions,
    ) -> Result<IngestReceipt, IngestError> {
        self.admit(uploader).await?;
        let options = options.with_default_ttl(self.default_ttl);
        check_expiry(&options)?;

        let archived = self
            .platform
            .forward_message(self.archive_channel, item)
            .await
            .map_err(|e| IngestError::Archive(e.to_string()))?;

        let record = self
            .commit(uploader.user_id, ContentKind::Single, vec![archived], &options)
            .await?;
        Ok(IngestReceipt {
            token: record.token,
            items: record.items,
            failed: 0,
            expires_at: record.expires_at,
        })
    }

    pub async fn begin_bundle(
        &self,
        uploader: Uploader,
        options: UploadOptions,
    ) -> Result<BundleStart, IngestError> {
        self.admit(uploader).await?;
        let options = options.with_default_ttl(self.default_ttl);
        check_expiry(&options)?;
        let replaced = self.sessions.begin(uploader.user_id, &options).await?;
        if let Some(count) = replaced {
            tracing::debug!(
                "User {} restarted a bundle, discarding {count} items",
                uploader.user_id
            );
        }
        Ok(BundleStart { replaced })
    }

    /// Returns the session's new item count.
    pub async fn add_to_bundle(
        &self,
        uploader: Uploader,
        item: MessageRef,
    ) -> Result<usize, IngestError> {
        self.sessions
            .append(uploader.user_id, item)
            .await?
            .ok_or(IngestError::NoActiveSession)
    }

    pub async fn has_open_bundle(&self, user_id: i64) -> Result<bool, IngestError> {
        Ok(self.sessions.get(user_id).await?.is_some())
    }

    /// Archive the collected items and issue one bundle link.
    ///
    /// When no item at all can be archived the session is kept so the user
    /// can try `/done` again.
    pub async fn finalize_bundle(&self, uploader: Uploader) -> Result<IngestReceipt, IngestError> {
        let session = self
            .sessions
            .get(uploader.user_id)
            .await?
            .ok_or(IngestError::NoActiveSession)?;
        if session.collected_items.is_empty() {
            self.sessions.clear(uploader.user_id).await?;
            return Err(IngestError::EmptyBundle);
        }
        self.admit(uploader).await?;

        let mut archived = Vec::with_capacity(session.collected_items.len());
        let mut failed = 0;
        for item in &session.collected_items {
            match self.platform.forward_message(self.archive_channel, *item).await {
                Ok(copy) => archived.push(copy),
                Err(e) => {
                    tracing::warn!(
                        "Archiving bundle item {} of user {} failed: {e}",
                        item.message_id,
                        uploader.user_id
                    );
                    failed += 1;
                }
            }
        }
        if archived.is_empty() {
            return Err(IngestError::Archive(format!(
                "none of the {failed} bundle items could be archived"
            )));
        }

        let record = self
            .commit(
                uploader.user_id,
                ContentKind::Bundle,
                archived,
                &session.options(),
            )
            .await?;
        self.sessions.clear(uploader.user_id).await?;
        tracing::info!(
            "User {} created bundle {} with {} items",
            uploader.user_id,
            record.token,
            record.items.len()
        );
        Ok(IngestReceipt {
            token: record.token,
            items: record.items,
            failed,
            expires_at: record.expires_at,
        })
    }

    pub async fn cancel_bundle(&self, uploader: Uploader) -> Result<bool, IngestError> {
        Ok(self.sessions.clear(uploader.user_id).await?)
    }

    /// Remove the link first so it stops resolving, then the archived copies.
    pub async fn revoke(&self, token: &str, owner_id: i64) -> Result<RevokeReport, IngestError> {
        let record = self.store.delete(token, owner_id).await?;
        let (archived_removed, archived_failed) = self.delivery.purge_archive(&record.items).await;
        tracing::info!(
            "User {owner_id} revoked {token} ({archived_removed} archived messages removed, {archived_failed} left)"
        );
        Ok(RevokeReport {
            token: record.token,
            archived_removed,
            archived_failed,
        })
    }

    /// Upload gate. Runs before anything touches the archive.
    async fn admit(&self, uploader: Uploader) -> Result<(), IngestError> {
        if !uploader.is_admin && self.upload_mode().await? == UploadMode::AdminsOnly {
            return Err(IngestError::UploadsRestricted);
        }
        if self.users.is_banned(uploader.user_id).await? {
            return Err(IngestError::Banned(uploader.user_id));
        }
        Ok(())
    }

    async fn commit(
        &self,
        owner_id: i64,
        kind: ContentKind,
        archived: Vec<MessageRef>,
        options: &UploadOptions,
    ) -> Result<ContentRecord, IngestError> {
        let issued = match ContentRecord::new(
            String::new(),
            kind,
            archived.clone(),
            owner_id,
            options,
            Utc::now(),
        ) {
            Ok(template) => {
                self.generator
                    .issue(self.store.as_ref(), |token| ContentRecord {
                        token,
                        ..template.clone()
                    })
                    .await
            }
            Err(RecordError::Shape { .. }) => Err(IngestError::EmptyBundle),
            Err(e @ RecordError::Expiry(_)) => Err(IngestError::InvalidExpiry(e.to_string())),
        };
        if issued.is_err() {
            // The copies would be unreachable without a record.
            self.delivery.purge_archive(&archived).await;
        }
        issued
    }
}

/// Refuse an expiry before anything is archived.
fn check_expiry(options: &UploadOptions) -> Result<(), IngestError> {
    if let Some(raw) = &options.rejected_expiry {
        return Err(IngestError::InvalidExpiry(raw.clone()));
    }
    options
        .expires_at(Utc::now())
        .map_err(|e| IngestError::InvalidExpiry(e.to_string()))?;
    Ok(())
}
