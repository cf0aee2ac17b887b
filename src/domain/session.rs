use crate::domain::model::{BundleSession, MessageRef, UploadOptions};
use crate::error::StoreError;
use crate::store::SessionStore;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Per-user bundle sessions with a sliding TTL.
///
/// An expired session behaves as absent and is removed when it is touched.
pub struct SessionTracker {
    store: Arc<dyn SessionStore>,
    ttl: ChronoDuration,
}

impl SessionTracker {
    pub fn new(store: Arc<dyn SessionStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl: ChronoDuration::from_std(ttl).unwrap_or(ChronoDuration::hours(1)),
        }
    }

    pub async fn get(&self, user_id: i64) -> Result<Option<BundleSession>, StoreError> {
        let Some(session) = self.store.get_session(user_id).await? else {
            return Ok(None);
        };
        if session.expires_at <= Utc::now() {
            tracing::debug!("Dropping expired bundle session of user {user_id}");
            self.store.delete_session(user_id).await?;
            return Ok(None);
        }
        Ok(Some(session))
    }

    pub async fn set(&self, session: &BundleSession) -> Result<(), StoreError> {
        self.store.put_session(session).await
    }

    /// Open an empty session, replacing any previous one. Returns the number
    /// of items the replaced session had collected.
    pub async fn begin(
        &self,
        user_id: i64,
        options: &UploadOptions,
    ) -> Result<Option<usize>, StoreError> {
        let replaced = self.get(user_id).await?.map(|s| s.collected_items.len());
        let now = Utc::now();
        let session = BundleSession {
            user_id,
            collected_items: Vec::new(),
            required_channel: options.required_channel.clone(),
            display_name: options.display_name.clone(),
            expires_after: options.expires_after,
            created_at: now,
            expires_at: self.deadline(now),
        };
        self.set(&session).await?;
        Ok(replaced)
    }

    /// Append to the live session. `None` when there is none.
    pub async fn append(&self, user_id: i64, item: MessageRef) -> Result<Option<usize>, StoreError> {
        let now = Utc::now();
        let appended = self
            .store
            .append_item(user_id, item, now, self.deadline(now))
            .await?;
        if appended.is_none() {
            // Clears a stale row if one is still around.
            self.store.delete_session(user_id).await?;
        }
        Ok(appended)
    }

    pub async fn clear(&self, user_id: i64) -> Result<bool, StoreError> {
        self.store.delete_session(user_id).await
    }

    fn deadline(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.ttl
    }
}
